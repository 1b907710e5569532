//! Wire shapes of the certificate-issuance protocol (ACME draft as served by Boulder)

use serde::{Deserialize, Serialize};
use volley_http::HttpMethod;

pub const DIRECTORY_PATH: &str = "/directory";
pub const NEW_REGISTRATION_PATH: &str = "/acme/new-reg";
pub const NEW_AUTHORIZATION_PATH: &str = "/acme/new-authz";
pub const NEW_CERTIFICATE_PATH: &str = "/acme/new-cert";
pub const REVOKE_CERTIFICATE_PATH: &str = "/acme/revoke-cert";

/// Latency label for challenge submissions, whose URLs are per-challenge
pub const CHALLENGE_LABEL: &str = "POST /acme/challenge";
/// Latency label for authorization polling, whose URLs are per-authorization
pub const AUTHORIZATION_POLL_LABEL: &str = "GET /acme/authz";

pub const HTTP01: &str = "http-01";

/// Label an exchange for latency bookkeeping, e.g. `POST /acme/new-reg`
pub fn endpoint_label(method: HttpMethod, path: &str) -> String {
    format!("{} {}", method, path)
}

/// Signed request payloads, tagged by the `resource` field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "resource")]
pub enum AcmeRequest {
    #[serde(rename = "new-reg")]
    NewRegistration { contact: Vec<String> },

    #[serde(rename = "new-authz")]
    NewAuthorization { identifier: Identifier },

    #[serde(rename = "challenge")]
    ChallengeAnswer {
        #[serde(rename = "type")]
        kind: String,
        #[serde(rename = "keyAuthorization")]
        key_authorization: String,
    },

    #[serde(rename = "new-cert")]
    NewCertificate { csr: String },

    #[serde(rename = "revoke-cert")]
    RevokeCertificate { certificate: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Identifier {
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            kind: "dns".to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
    Revoked,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationResource {
    pub status: AuthorizationStatus,
    #[serde(default)]
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub challenges: Vec<ChallengeResource>,
}

impl AuthorizationResource {
    pub fn http01_challenge(&self) -> Option<&ChallengeResource> {
        self.challenges.iter().find(|c| c.kind == HTTP01)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub token: String,
    #[serde(alias = "url")]
    pub uri: String,
}

/// Error document returned with non-2xx statuses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Problem {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}
