//! The import pipeline: parse, check, encrypt, upload.

mod encryptor;
mod import;

pub use encryptor::{SymmetricKeyEncryptor, VaultEncryptor};
pub use import::{map_server_error, prepare, ImportOptions, ImportService, ImportSummary, ImportTarget};
