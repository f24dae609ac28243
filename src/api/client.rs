use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

use super::types::{ErrorResponse, ImportCiphersRequest, ImportOrganizationCiphersRequest};
use super::{ApiError, ImportApi};

/// Bulk import over HTTPS with a bearer token.
pub struct HttpImportApi {
    client: Client,
    api_url: String,
    access_token: String,
}

impl HttpImportApi {
    pub fn new(api_url: &str, access_token: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn post<T: Serialize>(&self, path: &str, query: &[(&str, &str)], body: &T) -> Result<(), ApiError> {
        let url = format!("{}{}", self.api_url, path);
        debug!(%url, "posting import");
        let resp = self
            .client
            .post(&url)
            .query(query)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(body)
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        check(resp)
    }
}

fn check(resp: Response) -> Result<(), ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().map_err(|e| ApiError::Transport(e.to_string()))?;
    warn!(status = status.as_u16(), "import request failed");
    if status == StatusCode::BAD_REQUEST {
        if let Some(error) = ErrorResponse::parse(&body) {
            return Err(ApiError::Rejected(error));
        }
    }
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

impl ImportApi for HttpImportApi {
    fn post_import_ciphers(&self, request: &ImportCiphersRequest) -> Result<(), ApiError> {
        self.post("/ciphers/import", &[], request)
    }

    fn post_import_organization_ciphers(
        &self,
        organization_id: &str,
        request: &ImportOrganizationCiphersRequest,
    ) -> Result<(), ApiError> {
        self.post(
            "/ciphers/import-organization",
            &[("organizationId", organization_id)],
            request,
        )
    }
}
