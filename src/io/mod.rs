//! Input/output helpers.
//!
//! - spectrum and line-list ingest (`ingest`)
//! - CSV exports (`export`)
//! - profile JSON read/write (`profile_file`)

pub mod export;
pub mod ingest;
pub mod profile_file;

pub use export::*;
pub use ingest::*;
pub use profile_file::*;
