//! SPIR-V id remapper.
//!
//! Renames, canonicalizes, compacts and dead-code-eliminates the id space of a compiled
//! SPIR-V module in place. Structurally identical code compiled separately converges on
//! identical ids, which lets a downstream cache or linker deduplicate it.
//!
//! ```no_run
//! use spvremap_core::{Module, RemapOptions, Remapper};
//!
//! # fn run(bytes: &[u8]) -> spvremap_core::Result<Vec<u8>> {
//! let module = Module::from_bytes(bytes)?;
//! let mut remapper = Remapper::new(module).with_options(RemapOptions::ALL);
//! let stats = remapper.remap()?;
//! println!("{} -> {} words", stats.input_words, stats.output_words);
//! Ok(remapper.module().to_bytes())
//! # }
//! ```

pub mod remapper;

pub use remapper::config::{ConfigError, RemapConfig};
pub use remapper::error::{ErrorCategory, RemapError, Result};
pub use remapper::id_table::{IdState, IdTable};
pub use remapper::module::Module;
pub use remapper::opcode::{CoreOpcodeTable, OpcodeDesc, OpcodeTable, OperandKind};
pub use remapper::options::{HashParams, RemapOptions};
pub use remapper::pipeline::{remap_words, RemapStats, Remapper};
