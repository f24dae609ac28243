mod cipher;
mod result;

pub use cipher::*;
pub use result::{ImportResult, Relationship};
