mod client;
mod types;

use thiserror::Error;

pub use client::HttpImportApi;
pub use types::{
    CipherRequest, CollectionRequest, ErrorResponse, FieldRequest, FolderRequest,
    ImportCiphersRequest, ImportOrganizationCiphersRequest, RelationshipRequest,
};

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server refused the request and said why.
    #[error("{}", .0.message)]
    Rejected(ErrorResponse),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(String),
}

/// The two bulk-insert calls an import ends with.
pub trait ImportApi {
    fn post_import_ciphers(&self, request: &ImportCiphersRequest) -> Result<(), ApiError>;

    fn post_import_organization_ciphers(
        &self,
        organization_id: &str,
        request: &ImportOrganizationCiphersRequest,
    ) -> Result<(), ApiError>;
}
