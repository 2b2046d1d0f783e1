//! Memory and allocator capabilities, plus a simulated linear memory.

use super::CanonicalAbiError;

/// Size of a WebAssembly page in bytes.
pub const PAGE_SIZE: usize = 65536;

/// A byte-addressable, growable linear memory borrowed by the engine.
pub trait Memory {
    /// Current size in bytes.
    fn size(&self) -> usize;

    /// Borrow `len` bytes starting at `offset`.
    fn read(&self, offset: u32, len: u32) -> Result<&[u8], CanonicalAbiError>;

    /// Overwrite bytes starting at `offset`. The range must already exist.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), CanonicalAbiError>;

    /// Grow by `delta_pages` pages and return the previous size in pages.
    fn grow(&mut self, delta_pages: u32) -> Result<u32, CanonicalAbiError>;
}

/// A realloc-shaped allocator living in the same address space as a [`Memory`].
pub trait Realloc: Memory {
    /// Called with `old_ptr = 0, old_size = 0` for fresh allocations. The
    /// returned pointer must satisfy `align`; bytes beyond `old_size` are
    /// unspecified.
    fn realloc(
        &mut self,
        old_ptr: u32,
        old_size: u32,
        align: u32,
        new_size: u32,
    ) -> Result<u32, CanonicalAbiError>;
}

/// Simulated linear memory with a bump allocator.
///
/// Allocations grow the memory byte by byte rather than page by page, so an
/// encoded value's image is no larger than the data it holds. `grow` still
/// works in whole pages.
///
/// # Example
///
/// ```
/// use wit_canon::{LinearMemory, Memory, Realloc};
///
/// let mut mem = LinearMemory::new();
/// let ptr = mem.realloc(0, 0, 4, 8)?;
/// mem.write(ptr, &[1, 2, 3, 4])?;
/// assert_eq!(mem.read(ptr, 4)?, &[1, 2, 3, 4]);
/// # Ok::<(), wit_canon::CanonicalAbiError>(())
/// ```
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct LinearMemory {
    data: Vec<u8>,
    max_size: Option<usize>,
}

impl LinearMemory {
    /// Create a new empty linear memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zero-filled memory of `size` bytes.
    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0; size],
            max_size: None,
        }
    }

    /// Create a linear memory from existing bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            max_size: None,
        }
    }

    /// Limit the total size; allocations past it fail with `AllocationFailed`.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Allocate space at the end of memory and return the pointer (offset).
    pub fn alloc(&mut self, size: u32, align: u32) -> Result<u32, CanonicalAbiError> {
        let failed = CanonicalAbiError::AllocationFailed { size, align };
        let align = u64::from(align.max(1));
        let ptr = (self.data.len() as u64).div_ceil(align) * align;
        let end = ptr + u64::from(size);
        if end > u64::from(u32::MAX) || self.max_size.is_some_and(|max| end > max as u64) {
            return Err(failed);
        }
        self.data.resize(end as usize, 0);
        Ok(ptr as u32)
    }

    /// Get the raw bytes of the linear memory.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the linear memory and return the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Check if the memory is empty (no allocations made).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the length of the memory in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl Memory for LinearMemory {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn read(&self, offset: u32, len: u32) -> Result<&[u8], CanonicalAbiError> {
        let start = offset as usize;
        let end = start + len as usize;
        self.data
            .get(start..end)
            .ok_or(CanonicalAbiError::OutOfBounds {
                ptr: offset,
                len: u64::from(len),
                memory_size: self.data.len(),
            })
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), CanonicalAbiError> {
        let start = offset as usize;
        let end = start + bytes.len();
        let memory_size = self.data.len();
        self.data
            .get_mut(start..end)
            .ok_or(CanonicalAbiError::OutOfBounds {
                ptr: offset,
                len: bytes.len() as u64,
                memory_size,
            })?
            .copy_from_slice(bytes);
        Ok(())
    }

    fn grow(&mut self, delta_pages: u32) -> Result<u32, CanonicalAbiError> {
        let old_pages = self.data.len().div_ceil(PAGE_SIZE);
        let new_size = (old_pages + delta_pages as usize) * PAGE_SIZE;
        if new_size > u32::MAX as usize || self.max_size.is_some_and(|max| new_size > max) {
            return Err(CanonicalAbiError::AllocationFailed {
                size: delta_pages.saturating_mul(PAGE_SIZE as u32),
                align: 1,
            });
        }
        self.data.resize(new_size, 0);
        Ok(old_pages as u32)
    }
}

impl Realloc for LinearMemory {
    fn realloc(
        &mut self,
        old_ptr: u32,
        old_size: u32,
        align: u32,
        new_size: u32,
    ) -> Result<u32, CanonicalAbiError> {
        if !align.is_power_of_two() {
            return Err(CanonicalAbiError::AllocationFailed {
                size: new_size,
                align,
            });
        }
        let ptr = self.alloc(new_size, align)?;
        if old_size > 0 {
            let keep = old_size.min(new_size);
            let old = self.read(old_ptr, keep)?.to_vec();
            self.write(ptr, &old)?;
        }
        Ok(ptr)
    }
}

impl From<Vec<u8>> for LinearMemory {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&[u8]> for LinearMemory {
    fn from(data: &[u8]) -> Self {
        Self::from_bytes(data.to_vec())
    }
}

impl From<LinearMemory> for Vec<u8> {
    fn from(memory: LinearMemory) -> Self {
        memory.data
    }
}

impl AsRef<[u8]> for LinearMemory {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
