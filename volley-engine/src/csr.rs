//! Minimal PKCS#10 certificate signing requests (RFC 2986) for Ed25519 keys
//!
//! Only what issuance needs: a CN, the subject public key, and a
//! subjectAltName extension request listing the DNS names.

use crate::error::{LoadError, LoadResult};
use crate::signing::KeyMaterial;

const TAG_INTEGER: u8 = 0x02;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_UTF8_STRING: u8 = 0x0c;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;
const TAG_CONTEXT_0: u8 = 0xa0;
const TAG_DNS_NAME: u8 = 0x82;

/// 1.3.101.112
const OID_ED25519: &[u8] = &[0x06, 0x03, 0x2b, 0x65, 0x70];
/// 2.5.4.3
const OID_COMMON_NAME: &[u8] = &[0x06, 0x03, 0x55, 0x04, 0x03];
/// 2.5.29.17
const OID_SUBJECT_ALT_NAME: &[u8] = &[0x06, 0x03, 0x55, 0x1d, 0x11];
/// 1.2.840.113549.1.9.14
const OID_EXTENSION_REQUEST: &[u8] = &[
    0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x0e,
];

/// Upper bound on a CommonName (RFC 5280 ub-common-name)
const MAX_COMMON_NAME: usize = 64;

/// DER-encoded CSR for `domains`, signed by `key`
pub fn build_csr(key: &KeyMaterial, domains: &[String]) -> LoadResult<Vec<u8>> {
    let first = domains
        .first()
        .ok_or_else(|| LoadError::Signing("a CSR needs at least one DNS name".to_string()))?;

    let info = certification_request_info(key, first, domains);
    let signature = key.sign_raw(&info);

    Ok(tlv(
        TAG_SEQUENCE,
        &[info, tlv(TAG_SEQUENCE, OID_ED25519), bit_string(&signature)].concat(),
    ))
}

fn certification_request_info(key: &KeyMaterial, common_name: &str, domains: &[String]) -> Vec<u8> {
    let version = tlv(TAG_INTEGER, &[0x00]);

    // Long names are still covered by the SAN; the CN is optional
    let subject = if common_name.len() <= MAX_COMMON_NAME {
        let attribute = tlv(
            TAG_SEQUENCE,
            &[OID_COMMON_NAME, &tlv(TAG_UTF8_STRING, common_name.as_bytes())[..]].concat(),
        );
        tlv(TAG_SEQUENCE, &tlv(TAG_SET, &attribute))
    } else {
        tlv(TAG_SEQUENCE, &[])
    };

    let public_key_info = tlv(
        TAG_SEQUENCE,
        &[tlv(TAG_SEQUENCE, OID_ED25519), bit_string(&key.public_key())].concat(),
    );

    let names: Vec<u8> = domains
        .iter()
        .flat_map(|d| tlv(TAG_DNS_NAME, d.as_bytes()))
        .collect();
    let san = tlv(
        TAG_SEQUENCE,
        &[
            OID_SUBJECT_ALT_NAME,
            &tlv(TAG_OCTET_STRING, &tlv(TAG_SEQUENCE, &names))[..],
        ]
        .concat(),
    );
    let extensions = tlv(TAG_SEQUENCE, &san);
    let attribute = tlv(
        TAG_SEQUENCE,
        &[OID_EXTENSION_REQUEST, &tlv(TAG_SET, &extensions)[..]].concat(),
    );
    let attributes = tlv(TAG_CONTEXT_0, &attribute);

    tlv(
        TAG_SEQUENCE,
        &[version, subject, public_key_info, attributes].concat(),
    )
}

fn bit_string(bytes: &[u8]) -> Vec<u8> {
    // Leading octet: zero unused bits
    let mut content = Vec::with_capacity(bytes.len() + 1);
    content.push(0x00);
    content.extend_from_slice(bytes);
    tlv(TAG_BIT_STRING, &content)
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    encode_length(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    /// Split a DER element into (tag, header length, content length)
    fn read_header(der: &[u8]) -> (u8, usize, usize) {
        let tag = der[0];
        if der[1] < 0x80 {
            return (tag, 2, der[1] as usize);
        }
        let n = (der[1] & 0x7f) as usize;
        let len = der[2..2 + n]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (tag, 2 + n, len)
    }

    #[test]
    fn test_length_encoding() {
        let mut out = Vec::new();
        encode_length(5, &mut out);
        assert_eq!(out, vec![0x05]);

        out.clear();
        encode_length(200, &mut out);
        assert_eq!(out, vec![0x81, 200]);

        out.clear();
        encode_length(0x1234, &mut out);
        assert_eq!(out, vec![0x82, 0x12, 0x34]);
    }

    #[test]
    fn test_csr_structure_and_signature() {
        let key = KeyMaterial::from_seed(&[3u8; 32]).unwrap();
        let domains = vec!["abc-1.example.com".to_string()];
        let der = build_csr(&key, &domains).unwrap();

        // Outer SEQUENCE spans the whole buffer
        let (tag, header, len) = read_header(&der);
        assert_eq!(tag, TAG_SEQUENCE);
        assert_eq!(header + len, der.len());

        // First inner element is the signed CertificationRequestInfo
        let inner = &der[header..];
        let (info_tag, info_header, info_len) = read_header(inner);
        assert_eq!(info_tag, TAG_SEQUENCE);
        let info = &inner[..info_header + info_len];

        // The signature is the trailing 64 bytes of the final BIT STRING
        let signature: [u8; 64] = der[der.len() - 64..].try_into().unwrap();
        let verifying = VerifyingKey::from_bytes(&key.public_key()).unwrap();
        assert!(verifying
            .verify(info, &Signature::from_bytes(&signature))
            .is_ok());

        let haystack = String::from_utf8_lossy(&der);
        assert!(haystack.contains("abc-1.example.com"));
    }

    #[test]
    fn test_long_name_skips_common_name() {
        let key = KeyMaterial::from_seed(&[4u8; 32]).unwrap();
        let long = format!("{}.example.com", "a".repeat(60));
        let der = build_csr(&key, &[long.clone()]).unwrap();

        let cn_positions = der
            .windows(OID_COMMON_NAME.len())
            .filter(|w| *w == OID_COMMON_NAME)
            .count();
        assert_eq!(cn_positions, 0);
        assert!(String::from_utf8_lossy(&der).contains(&long));
    }

    #[test]
    fn test_no_domains_is_rejected() {
        let key = KeyMaterial::from_seed(&[5u8; 32]).unwrap();
        assert!(matches!(build_csr(&key, &[]), Err(LoadError::Signing(_))));
    }
}
