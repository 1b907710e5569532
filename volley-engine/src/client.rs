//! Simulated protocol accounts
//!
//! A `ClientRecord` is immutable apart from its authorization and
//! certificate lists, which sit behind the record's own lock. That lock is
//! independent of the registry lock and is never held across an await.

use crate::signing::KeyMaterial;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicU64, Ordering};

/// A validated authorization held by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub url: String,
    pub domain: String,
}

/// A certificate issued to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub url: String,
    pub der: Vec<u8>,
}

/// Counts the legality rules look at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientSnapshot {
    pub authorizations: usize,
    pub certificates: usize,
}

#[derive(Debug, Default)]
struct ClientState {
    authorizations: Vec<Authorization>,
    certificates: Vec<IssuedCertificate>,
}

#[derive(Debug)]
pub struct ClientRecord {
    key: KeyMaterial,
    registration_url: String,
    label: String,
    next_domain: AtomicU64,
    state: RwLock<ClientState>,
}

impl ClientRecord {
    pub fn new(key: KeyMaterial, registration_url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key,
            registration_url: registration_url.into(),
            label: label.into(),
            next_domain: AtomicU64::new(0),
            state: RwLock::new(ClientState::default()),
        }
    }

    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }

    pub fn registration_url(&self) -> &str {
        &self.registration_url
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Mint a domain no other authorization of this client has used
    pub fn next_domain(&self, domain_base: &str) -> String {
        let n = self.next_domain.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}.{}", self.label, n, domain_base)
    }

    pub fn snapshot(&self) -> ClientSnapshot {
        let state = self.state.read();
        ClientSnapshot {
            authorizations: state.authorizations.len(),
            certificates: state.certificates.len(),
        }
    }

    pub fn add_authorization(&self, authorization: Authorization) {
        self.state.write().authorizations.push(authorization);
    }

    pub fn add_certificate(&self, certificate: IssuedCertificate) {
        self.state.write().certificates.push(certificate);
    }

    pub fn random_authorization(&self) -> Option<Authorization> {
        self.state
            .read()
            .authorizations
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    pub fn random_certificate(&self) -> Option<IssuedCertificate> {
        self.state
            .read()
            .certificates
            .choose(&mut rand::thread_rng())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ClientRecord {
        ClientRecord::new(
            KeyMaterial::from_seed(&[1u8; 32]).unwrap(),
            "http://target/acme/reg/1",
            "abcdef",
        )
    }

    #[test]
    fn test_new_record_is_empty() {
        let client = record();
        assert_eq!(client.snapshot(), ClientSnapshot::default());
        assert!(client.random_authorization().is_none());
        assert!(client.random_certificate().is_none());
        assert_eq!(client.registration_url(), "http://target/acme/reg/1");
    }

    #[test]
    fn test_state_accumulates() {
        let client = record();
        client.add_authorization(Authorization {
            url: "http://target/acme/authz/1".to_string(),
            domain: "abcdef-0.example.com".to_string(),
        });
        client.add_certificate(IssuedCertificate {
            url: "http://target/acme/cert/1".to_string(),
            der: vec![0x30, 0x00],
        });
        client.add_certificate(IssuedCertificate {
            url: "http://target/acme/cert/2".to_string(),
            der: vec![0x30, 0x00],
        });

        assert_eq!(
            client.snapshot(),
            ClientSnapshot {
                authorizations: 1,
                certificates: 2
            }
        );
        assert_eq!(
            client.random_authorization().unwrap().domain,
            "abcdef-0.example.com"
        );
        assert!(client.random_certificate().is_some());
    }

    #[test]
    fn test_domains_are_distinct() {
        let client = record();
        let first = client.next_domain("example.com");
        let second = client.next_domain("example.com");
        assert_eq!(first, "abcdef-0.example.com");
        assert_eq!(second, "abcdef-1.example.com");
    }
}
