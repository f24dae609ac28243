mod store;
mod types;

pub use store::{ConfigStore, SETTABLE_KEYS};
pub use types::{Config, CredentialsFile, DEFAULT_API_URL};
