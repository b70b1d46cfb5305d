pub mod error;
pub mod module;
pub mod opcode;
pub mod walker;
pub mod id_table;
pub mod index;
pub mod strip;
pub mod type_hash;
pub mod canonicalize;
pub mod dce;
pub mod load_store;
pub mod options;
pub mod config;
pub mod pipeline;
