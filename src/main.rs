use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use wit_canon::config::ConfigError;
use wit_canon::wave::{WaveError, format_value, parse_value};
use wit_canon::wit::{WitError, load_wit_path};
use wit_canon::{CanonicalAbi, CanonicalAbiError, CanonicalOptions, EncodedValue, LinearMemory};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Wit(#[from] WitError),

    #[error("{0}")]
    Wave(#[from] WaveError),

    #[error("Canonical ABI error: {0}")]
    CanonicalAbi(#[from] CanonicalAbiError),

    #[error("{0}")]
    Config(#[from] ConfigError),
}

#[derive(Parser)]
#[command(name = "wit-canon")]
#[command(about = "Inspect canonical ABI layouts and lower/lift WIT values")]
struct Cli {
    /// TOML file with engine options
    #[arg(long, global = true, env = "WIT_CANON_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the size, alignment, flattening and field offsets of a type
    Layout {
        /// Path to the WIT file containing the type definition
        #[arg(short, long)]
        wit: PathBuf,

        /// Name of the type to use (if not specified, uses the first type found)
        #[arg(short = 't', long)]
        type_name: Option<String>,
    },

    /// Lower a WAVE-encoded value to a canonical ABI memory image
    Lower {
        /// Path to the WIT file containing the type definition
        #[arg(short, long)]
        wit: PathBuf,

        /// Name of the type to use (if not specified, uses the first type found)
        #[arg(short = 't', long)]
        type_name: Option<String>,

        /// WAVE-encoded value to lower
        #[arg(short, long)]
        value: String,

        /// Output file for the memory image
        #[arg(short, long, required_unless_present = "flat")]
        output: Option<PathBuf>,

        /// Print the flat core values instead of writing a memory image
        #[arg(long)]
        flat: bool,
    },

    /// Lift a memory image back to a WAVE-encoded value
    Lift {
        /// Path to the WIT file containing the type definition
        #[arg(short, long)]
        wit: PathBuf,

        /// Name of the type to use (if not specified, uses the first type found)
        #[arg(short = 't', long)]
        type_name: Option<String>,

        /// Input file containing the memory image
        #[arg(short, long)]
        input: PathBuf,

        /// Offset of the value within the image
        #[arg(long, default_value_t = 0)]
        pointer: u32,

        /// Output file for WAVE representation (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = load_options(cli.config.as_deref())?;

    match cli.command {
        Commands::Layout { wit, type_name } => {
            let (table, ty) = load_wit_path(&wit, type_name.as_deref())?;
            let abi = CanonicalAbi::with_options(&table, options);

            let layout = abi.layout(&ty);
            let flat: Vec<String> = abi.flatten(&ty).iter().map(|t| t.to_string()).collect();
            println!("type:   {}", ty.name());
            println!("size:   {}", layout.size);
            println!("align:  {}", layout.align);
            println!("flat:   [{}]", flat.join(", "));
            if let Some(offsets) = abi.field_offsets(&ty) {
                let offsets: Vec<String> = offsets.iter().map(|o| o.to_string()).collect();
                println!("fields: [{}]", offsets.join(", "));
            }
            Ok(())
        }
        Commands::Lower {
            wit,
            type_name,
            value,
            output,
            flat,
        } => {
            let (table, ty) = load_wit_path(&wit, type_name.as_deref())?;
            let abi = CanonicalAbi::with_options(&table, options);
            let parsed = parse_value(&table, &value, &ty)?;

            if flat {
                let mut memory = LinearMemory::new();
                let values = abi.lower_flat(&parsed, &ty, &mut memory)?;
                for value in &values {
                    println!("{}", value);
                }
                if !memory.is_empty() {
                    eprintln!("({} bytes of memory allocated)", memory.len());
                }
                if let Some(output) = output {
                    std::fs::write(&output, memory.as_bytes())?;
                }
                return Ok(());
            }

            let encoded = abi.encode(&parsed, &ty)?;
            let Some(output) = output else {
                return Ok(());
            };
            std::fs::write(&output, &encoded.memory)?;
            println!(
                "Lowered value to {} ({} bytes)",
                output.display(),
                encoded.memory.len()
            );
            Ok(())
        }
        Commands::Lift {
            wit,
            type_name,
            input,
            pointer,
            output,
        } => {
            let (table, ty) = load_wit_path(&wit, type_name.as_deref())?;
            let abi = CanonicalAbi::with_options(&table, options);

            let encoded = EncodedValue {
                pointer,
                memory: std::fs::read(&input)?,
            };
            let value = abi.decode(&encoded, &ty)?;
            let text = format_value(&table, &value, &ty)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &text)?;
                    println!("Lifted value to {}", path.display());
                }
                None => println!("{}", text),
            }
            Ok(())
        }
    }
}

fn load_options(path: Option<&Path>) -> Result<CanonicalOptions, AppError> {
    match path {
        Some(path) => Ok(CanonicalOptions::from_file(path)?),
        None => Ok(CanonicalOptions::default()),
    }
}
