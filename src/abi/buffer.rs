//! Low-level read/write helpers over a [`Memory`].

use super::memory::Memory;
use super::CanonicalAbiError;

/// Align a value up to the nearest multiple of alignment.
#[inline]
pub fn align_to(val: u32, align: u32) -> u32 {
    (val + align - 1) & !(align - 1)
}

/// Check that `ptr` is a multiple of `align`.
#[inline]
pub fn check_aligned(ptr: u32, align: u32) -> Result<(), CanonicalAbiError> {
    if ptr % align == 0 {
        Ok(())
    } else {
        Err(CanonicalAbiError::MisalignedPointer { ptr, align })
    }
}

/// Check that `[ptr, ptr + len)` lies inside memory without reading it.
#[inline]
pub fn check_range<M: Memory + ?Sized>(
    memory: &M,
    ptr: u32,
    len: u64,
) -> Result<(), CanonicalAbiError> {
    if u64::from(ptr) + len > memory.size() as u64 {
        return Err(CanonicalAbiError::OutOfBounds {
            ptr,
            len,
            memory_size: memory.size(),
        });
    }
    Ok(())
}

/// Read exactly `N` bytes at `ptr`.
#[inline]
pub fn read_array<const N: usize, M: Memory + ?Sized>(
    memory: &M,
    ptr: u32,
) -> Result<[u8; N], CanonicalAbiError> {
    memory
        .read(ptr, N as u32)?
        .try_into()
        .map_err(|_| CanonicalAbiError::OutOfBounds {
            ptr,
            len: N as u64,
            memory_size: memory.size(),
        })
}

#[inline]
pub fn read_u8<M: Memory + ?Sized>(memory: &M, ptr: u32) -> Result<u8, CanonicalAbiError> {
    Ok(u8::from_le_bytes(read_array::<1, M>(memory, ptr)?))
}

#[inline]
pub fn read_u16<M: Memory + ?Sized>(memory: &M, ptr: u32) -> Result<u16, CanonicalAbiError> {
    Ok(u16::from_le_bytes(read_array::<2, M>(memory, ptr)?))
}

#[inline]
pub fn read_u32<M: Memory + ?Sized>(memory: &M, ptr: u32) -> Result<u32, CanonicalAbiError> {
    Ok(u32::from_le_bytes(read_array::<4, M>(memory, ptr)?))
}

#[inline]
pub fn read_u64<M: Memory + ?Sized>(memory: &M, ptr: u32) -> Result<u64, CanonicalAbiError> {
    Ok(u64::from_le_bytes(read_array::<8, M>(memory, ptr)?))
}

/// Read a little-endian unsigned integer of `size` bytes (1, 2 or 4).
pub fn read_uint<M: Memory + ?Sized>(
    memory: &M,
    ptr: u32,
    size: u32,
) -> Result<u32, CanonicalAbiError> {
    match size {
        1 => read_u8(memory, ptr).map(u32::from),
        2 => read_u16(memory, ptr).map(u32::from),
        _ => read_u32(memory, ptr),
    }
}

/// Write the low `size` bytes (1, 2 or 4) of `value` in little-endian order.
pub fn write_uint<M: Memory + ?Sized>(
    memory: &mut M,
    ptr: u32,
    size: u32,
    value: u32,
) -> Result<(), CanonicalAbiError> {
    match size {
        1 => memory.write(ptr, &[value as u8]),
        2 => memory.write(ptr, &(value as u16).to_le_bytes()),
        _ => memory.write(ptr, &value.to_le_bytes()),
    }
}
