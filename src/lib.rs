//! Credential import pipeline: turn password manager exports into Bitwarden
//! vault items, encrypt them and upload them in one bulk request.

pub mod api;
pub mod cli;
pub mod crypto;
pub mod error;
pub mod importer;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod service;
pub mod storage;

pub use error::ImportError;
