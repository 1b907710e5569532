//! Key material and signed envelopes
//!
//! Accounts sign every write with a flattened JWS (`alg: EdDSA`) whose
//! protected header embeds the account JWK and the anti-replay nonce.

use crate::error::{LoadError, LoadResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use volley_config::domains::load::SUPPORTED_KEY_BITS;

/// Public half of an Ed25519 key as a JWK (RFC 8037)
///
/// Fields are declared in lexicographic order so the serialised form is the
/// RFC 7638 thumbprint input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub crv: String,
    pub kty: String,
    pub x: String,
}

/// Flattened JWS JSON serialisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsEnvelope {
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

#[derive(Serialize)]
struct ProtectedHeader<'a> {
    alg: &'static str,
    jwk: &'a Jwk,
    nonce: &'a str,
}

/// An Ed25519 key pair with its JWK and thumbprint precomputed
pub struct KeyMaterial {
    signing: SigningKey,
    jwk: Jwk,
    thumbprint: String,
}

// Keep secret key bytes out of logs
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("thumbprint", &self.thumbprint)
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Generate a fresh key of `bits` bits
    pub fn generate(bits: u32) -> LoadResult<Self> {
        if bits != SUPPORTED_KEY_BITS {
            return Err(LoadError::Configuration(format!(
                "unsupported signing key size {bits}; only {SUPPORTED_KEY_BITS}-bit Ed25519 keys are supported"
            )));
        }
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Deterministic key from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> LoadResult<Self> {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    fn from_signing_key(signing: SigningKey) -> LoadResult<Self> {
        let jwk = Jwk {
            crv: "Ed25519".to_string(),
            kty: "OKP".to_string(),
            x: URL_SAFE_NO_PAD.encode(signing.verifying_key().to_bytes()),
        };
        let canonical = serde_json::to_vec(&jwk)
            .map_err(|e| LoadError::Signing(format!("failed to serialise JWK: {e}")))?;
        let thumbprint = URL_SAFE_NO_PAD.encode(Sha256::digest(&canonical));

        Ok(Self {
            signing,
            jwk,
            thumbprint,
        })
    }

    /// RFC 7638 JWK thumbprint, base64url
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// Raw public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// The http-01 key authorization for `token`
    pub fn key_authorization(&self, token: &str) -> String {
        format!("{}.{}", token, self.thumbprint)
    }

    /// Plain Ed25519 signature over `message`
    pub fn sign_raw(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }

    /// Wrap `payload` in a JWS bound to `nonce`
    pub fn sign(&self, payload: &[u8], nonce: &str) -> LoadResult<JwsEnvelope> {
        let header = ProtectedHeader {
            alg: "EdDSA",
            jwk: &self.jwk,
            nonce,
        };
        let header = serde_json::to_vec(&header)
            .map_err(|e| LoadError::Signing(format!("failed to serialise protected header: {e}")))?;

        let protected = URL_SAFE_NO_PAD.encode(header);
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let signing_input = format!("{protected}.{payload}");
        let signature = URL_SAFE_NO_PAD.encode(self.sign_raw(signing_input.as_bytes()));

        Ok(JwsEnvelope {
            protected,
            payload,
            signature,
        })
    }
}
