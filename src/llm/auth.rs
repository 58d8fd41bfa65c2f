//! Authentication for the Bedrock runtime API
//!
//! Two credential sources are supported:
//! - A Bedrock API key (`AWS_BEARER_TOKEN_BEDROCK`), sent as a bearer token
//! - IAM credentials (`AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` /
//!   `AWS_SESSION_TOKEN`), used to sign each request with AWS Signature V4

use anyhow::Result;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::env;

use crate::core::AgentError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// IAM credentials
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("has_session_token", &self.session_token.is_some())
            .finish()
    }
}

/// Credentials used to authenticate Bedrock requests
#[derive(Clone)]
pub enum BedrockCredentials {
    /// Bedrock API key, sent as `Authorization: Bearer <key>`
    ApiKey(String),
    /// IAM credentials, requests are SigV4-signed
    Aws(AwsCredentials),
}

impl std::fmt::Debug for BedrockCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BedrockCredentials::ApiKey(_) => f.write_str("ApiKey(..)"),
            BedrockCredentials::Aws(creds) => f.debug_tuple("Aws").field(creds).finish(),
        }
    }
}

impl BedrockCredentials {
    /// Resolve credentials from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve credentials through an arbitrary variable lookup
    ///
    /// An API key wins over IAM credentials when both are present.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("AWS_BEARER_TOKEN_BEDROCK") {
            tracing::info!("[Auth] Using Bedrock API key");
            return Ok(BedrockCredentials::ApiKey(token));
        }

        match (non_empty("AWS_ACCESS_KEY_ID"), non_empty("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => {
                tracing::info!("[Auth] Using IAM credentials (SigV4)");
                Ok(BedrockCredentials::Aws(AwsCredentials {
                    access_key_id,
                    secret_access_key,
                    session_token: non_empty("AWS_SESSION_TOKEN"),
                }))
            }
            _ => Err(AgentError::MissingCredentials(
                "set AWS_BEARER_TOKEN_BEDROCK, or AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY"
                    .to_string(),
            )
            .into()),
        }
    }
}

// ============================================================================
// SigV4
// ============================================================================

/// What a request is signed for
#[derive(Debug, Clone)]
pub struct SigningParams<'a> {
    pub credentials: &'a AwsCredentials,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

/// Request parts that go into the signature
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    /// Path exactly as sent on the wire (already percent-encoded)
    pub path: &'a str,
    pub content_type: &'a str,
    pub body: &'a [u8],
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Derive the signing key for a date/region/service scope
pub fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Canonical URI for non-S3 services: every segment encoded once more
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Sign a request, returning the headers to attach (name, value)
///
/// The returned list contains `x-amz-date`, `x-amz-security-token` (when a
/// session token is present) and `authorization`.
pub fn sign_request(request: &SignableRequest<'_>, params: &SigningParams<'_>) -> Vec<(String, String)> {
    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = params.time.format("%Y%m%d").to_string();

    let mut headers: Vec<(String, String)> = vec![
        ("content-type".to_string(), request.content_type.trim().to_string()),
        ("host".to_string(), request.host.trim().to_string()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(ref token) = params.credentials.session_token {
        headers.push(("x-amz-security-token".to_string(), token.trim().to_string()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        request.method,
        canonical_uri(request.path),
        canonical_headers,
        signed_headers,
        sha256_hex(request.body)
    );

    let scope = format!("{}/{}/{}/aws4_request", date, params.region, params.service);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(
        &params.credentials.secret_access_key,
        &date,
        params.region,
        params.service,
    );
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, params.credentials.access_key_id, scope, signed_headers, signature
    );

    let mut out = vec![("x-amz-date".to_string(), amz_date)];
    if let Some(ref token) = params.credentials.session_token {
        out.push(("x-amz-security-token".to_string(), token.clone()));
    }
    out.push(("authorization".to_string(), authorization));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    const EXAMPLE_SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_credentials(session_token: Option<&str>) -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: EXAMPLE_SECRET.to_string(),
            session_token: session_token.map(String::from),
        }
    }

    #[test]
    fn test_signing_key_matches_published_vector() {
        let key = derive_signing_key(EXAMPLE_SECRET, "20120215", "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_canonical_uri_double_encodes_model_id() {
        assert_eq!(
            canonical_uri("/model/eu.anthropic.claude-sonnet-4-20250514-v1%3A0/converse"),
            "/model/eu.anthropic.claude-sonnet-4-20250514-v1%253A0/converse"
        );
        assert_eq!(canonical_uri(""), "/");
    }

    #[test]
    fn test_sign_converse_request() {
        let credentials = example_credentials(None);
        let params = SigningParams {
            credentials: &credentials,
            region: "eu-central-1",
            service: "bedrock",
            time: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        };
        let request = SignableRequest {
            method: "POST",
            host: "bedrock-runtime.eu-central-1.amazonaws.com",
            path: "/model/eu.anthropic.claude-sonnet-4-20250514-v1%3A0/converse",
            content_type: "application/json",
            body: br#"{"messages":[]}"#,
        };

        let headers: HashMap<String, String> = sign_request(&request, &params).into_iter().collect();

        assert_eq!(headers["x-amz-date"], "20240102T030405Z");
        assert_eq!(
            headers["authorization"],
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240102/eu-central-1/bedrock/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=f868a6d1873411f1dedb39285d4adf89fe8c249fcae70b776662bbfff59c62e4"
        );
        assert!(!headers.contains_key("x-amz-security-token"));
    }

    #[test]
    fn test_session_token_is_signed() {
        let credentials = example_credentials(Some("session-token"));
        let params = SigningParams {
            credentials: &credentials,
            region: "eu-central-1",
            service: "bedrock",
            time: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        };
        let request = SignableRequest {
            method: "POST",
            host: "bedrock-runtime.eu-central-1.amazonaws.com",
            path: "/model/m/converse",
            content_type: "application/json",
            body: b"{}",
        };

        let headers: HashMap<String, String> = sign_request(&request, &params).into_iter().collect();
        assert_eq!(headers["x-amz-security-token"], "session-token");
        assert!(headers["authorization"]
            .contains("SignedHeaders=content-type;host;x-amz-date;x-amz-security-token,"));
    }

    #[test]
    fn test_credentials_prefer_api_key() {
        let vars: HashMap<&str, &str> = [
            ("AWS_BEARER_TOKEN_BEDROCK", "bedrock-key"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]
        .into_iter()
        .collect();

        let creds = BedrockCredentials::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert!(matches!(creds, BedrockCredentials::ApiKey(ref k) if k == "bedrock-key"));
    }

    #[test]
    fn test_credentials_from_iam_variables() {
        let vars: HashMap<&str, &str> = [
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", "token"),
        ]
        .into_iter()
        .collect();

        match BedrockCredentials::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap() {
            BedrockCredentials::Aws(creds) => {
                assert_eq!(creds.access_key_id, "AKID");
                assert_eq!(creds.session_token.as_deref(), Some("token"));
            }
            other => panic!("Expected IAM credentials, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_credentials() {
        let err = BedrockCredentials::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("Missing credentials"));
    }
}
