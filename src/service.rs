//! Identifier service
//!
//! [`IdentifierService`] is the contract the client depends on. The HTTP
//! implementation talks to the hosted identifiers service; the in-memory one
//! in [`crate::memory`] backs tests and offline runs.

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use std::time::Duration;

use crate::auth::BearerToken;
use crate::error::{MinidError, Result};
use crate::record::{IdentifierLookup, IdentifierRecord, IdentifierUpdate, NewIdentifier};

pub const DEFAULT_SERVICE_URL: &str = "https://identifiers.fair-research.org/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations offered by the identifier registry
pub trait IdentifierService {
    /// Mint a new identifier
    fn create_identifier(&self, request: &NewIdentifier) -> Result<IdentifierRecord>;

    /// Change an existing identifier; `identifier` is in hdl form
    fn update_identifier(&self, identifier: &str, update: &IdentifierUpdate) -> Result<IdentifierRecord>;

    /// Fetch one identifier; `identifier` is in hdl form
    fn get_identifier(&self, identifier: &str) -> Result<IdentifierRecord>;

    /// All identifiers registered with a checksum value
    fn get_identifier_by_checksum(&self, checksum: &str) -> Result<IdentifierLookup>;
}

impl<S: IdentifierService + ?Sized> IdentifierService for &S {
    fn create_identifier(&self, request: &NewIdentifier) -> Result<IdentifierRecord> {
        (**self).create_identifier(request)
    }

    fn update_identifier(&self, identifier: &str, update: &IdentifierUpdate) -> Result<IdentifierRecord> {
        (**self).update_identifier(identifier, update)
    }

    fn get_identifier(&self, identifier: &str) -> Result<IdentifierRecord> {
        (**self).get_identifier(identifier)
    }

    fn get_identifier_by_checksum(&self, checksum: &str) -> Result<IdentifierLookup> {
        (**self).get_identifier_by_checksum(checksum)
    }
}

/// Client for the hosted identifiers service (HTTP + JSON)
pub struct HttpIdentifierService {
    client: Client,
    base_url: String,
    token: Option<BearerToken>,
}

impl HttpIdentifierService {
    /// Build a client with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration, token: Option<BearerToken>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("minid/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, token.header_value()),
            None => request,
        }
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.authorize(request).send()?;
        handle_response(response)
    }
}

impl IdentifierService for HttpIdentifierService {
    fn create_identifier(&self, request: &NewIdentifier) -> Result<IdentifierRecord> {
        tracing::debug!(namespace = %request.namespace, "create identifier");
        self.send(self.client.post(self.url("identifier/")).json(request))
    }

    fn update_identifier(&self, identifier: &str, update: &IdentifierUpdate) -> Result<IdentifierRecord> {
        tracing::debug!(%identifier, "update identifier");
        self.send(
            self.client
                .patch(self.url(&format!("identifier/{}", identifier)))
                .json(update),
        )
    }

    fn get_identifier(&self, identifier: &str) -> Result<IdentifierRecord> {
        tracing::debug!(%identifier, "get identifier");
        self.send(self.client.get(self.url(&format!("identifier/{}", identifier))))
    }

    fn get_identifier_by_checksum(&self, checksum: &str) -> Result<IdentifierLookup> {
        tracing::debug!(%checksum, "lookup identifiers by checksum");
        self.send(
            self.client
                .get(self.url("identifier/"))
                .query(&[("checksum", checksum)]),
        )
    }
}

/// Decode a successful response, or turn the service's error body into
/// [`MinidError::Registry`]
fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json()?);
    }

    let body = response.text().unwrap_or_default();
    Err(MinidError::Registry {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| {
            status.canonical_reason().unwrap_or("request failed").to_string()
        }),
    })
}

/// The `message` field of a JSON error body, or the raw text
fn error_message(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => json
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .or_else(|| Some(json.to_string())),
        Err(_) => Some(body.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_message_field() {
        assert_eq!(
            error_message(r#"{"code": "NotFound", "message": "No such identifier"}"#),
            Some("No such identifier".to_string())
        );
        assert_eq!(error_message("Bad Gateway"), Some("Bad Gateway".to_string()));
        assert_eq!(error_message("   "), None);
    }

    #[test]
    fn test_base_url_is_normalized() {
        let service = HttpIdentifierService::new(DEFAULT_SERVICE_URL, DEFAULT_TIMEOUT, None).unwrap();
        assert_eq!(service.base_url(), "https://identifiers.fair-research.org");
        assert_eq!(
            service.url("identifier/"),
            "https://identifiers.fair-research.org/identifier/"
        );
    }
}
