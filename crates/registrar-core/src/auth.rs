//! HTTP-Digest (MD5) authentication for REGISTER
//!
//! The registrar keeps no nonce state: a challenge carries a fresh random
//! nonce, and the later Authorization header is verified against the nonce
//! and realm the client echoes back.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use rand::RngCore;

/// Parameters of a `Digest` Authorization header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestCredentials {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub algorithm: Option<String>,
}

impl DigestCredentials {
    /// Parse `Digest k="v", k2=v2, ...`. Commas inside quotes are kept.
    ///
    /// Returns `None` for other schemes or when `username` or `response`
    /// is missing.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, rest) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let params = parse_params(rest);
        let take = |key: &str| params.get(key).cloned().unwrap_or_default();

        let creds = DigestCredentials {
            username: take("username"),
            realm: take("realm"),
            nonce: take("nonce"),
            uri: take("uri"),
            response: take("response"),
            algorithm: params.get("algorithm").cloned(),
        };

        if creds.username.is_empty() || creds.response.is_empty() {
            return None;
        }
        Some(creds)
    }

    /// Check the response against `password` for `method`
    pub fn verify(&self, method: &str, password: &str) -> bool {
        let expected = compute_digest_response(
            &self.username,
            &self.realm,
            password,
            method,
            &self.uri,
            &self.nonce,
        );
        expected.eq_ignore_ascii_case(self.response.trim())
    }
}

fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);

    for part in parts {
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            params.insert(key.trim().to_ascii_lowercase(), value.to_string());
        }
    }
    params
}

pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// `MD5(MD5(user:realm:password):nonce:MD5(method:uri))`
pub fn compute_digest_response(
    username: &str,
    realm: &str,
    password: &str,
    method: &str,
    uri: &str,
    nonce: &str,
) -> String {
    let ha1 = md5_hex(&format!("{}:{}:{}", username, realm, password));
    let ha2 = md5_hex(&format!("{}:{}", method, uri));
    md5_hex(&format!("{}:{}:{}", ha1, nonce, ha2))
}

/// Fresh nonce from the clock, the peer address and 16 random bytes
pub fn generate_nonce(peer: SocketAddr) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    md5_hex(&format!("{}:{}:{}", nanos, peer, hex::encode(salt)))
}

/// Value of the `WWW-Authenticate` header for a 401
pub fn challenge(realm: &str, nonce: &str) -> String {
    format!("Digest realm=\"{}\", nonce=\"{}\"", realm, nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_manual_computation() {
        let ha1 = md5_hex("u:r:p");
        let ha2 = md5_hex("REGISTER:sip:x");
        let expected = md5_hex(&format!("{}:n:{}", ha1, ha2));
        assert_eq!(compute_digest_response("u", "r", "p", "REGISTER", "sip:x", "n"), expected);
    }

    #[test]
    fn md5_known_vector() {
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn verify_accepts_correct_and_rejects_one_char_change() {
        let response = compute_digest_response("u", "r", "p", "REGISTER", "sip:x", "n");
        let mut creds = DigestCredentials {
            username: "u".into(),
            realm: "r".into(),
            nonce: "n".into(),
            uri: "sip:x".into(),
            response: response.to_uppercase(),
            algorithm: None,
        };
        assert!(creds.verify("REGISTER", "p"));
        assert!(!creds.verify("REGISTER", "q"));

        let mut tampered = response.into_bytes();
        tampered[0] = if tampered[0] == b'0' { b'1' } else { b'0' };
        creds.response = String::from_utf8(tampered).unwrap();
        assert!(!creds.verify("REGISTER", "p"));
    }

    #[test]
    fn parse_authorization_header() {
        let header = r#"Digest username="gateway-monitor", realm="voip-monitor.local", nonce="abc,def", uri="sip:voip-monitor.local", response="0123abcd", algorithm=MD5"#;
        let creds = DigestCredentials::parse(header).unwrap();
        assert_eq!(creds.username, "gateway-monitor");
        assert_eq!(creds.realm, "voip-monitor.local");
        assert_eq!(creds.nonce, "abc,def");
        assert_eq!(creds.uri, "sip:voip-monitor.local");
        assert_eq!(creds.response, "0123abcd");
        assert_eq!(creds.algorithm.as_deref(), Some("MD5"));
    }

    #[test]
    fn parse_rejects_other_schemes_and_missing_fields() {
        assert!(DigestCredentials::parse("Basic dXNlcjpwYXNz").is_none());
        assert!(DigestCredentials::parse(r#"Digest realm="r", nonce="n""#).is_none());
        assert!(DigestCredentials::parse("").is_none());
    }

    #[test]
    fn nonces_differ() {
        let peer: SocketAddr = "192.168.1.10:5060".parse().unwrap();
        let a = generate_nonce(peer);
        let b = generate_nonce(peer);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert_eq!(
            challenge("voip-monitor.local", &a),
            format!("Digest realm=\"voip-monitor.local\", nonce=\"{}\"", a)
        );
    }
}
