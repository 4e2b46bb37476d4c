// Error taxonomy for the cluster REST API.
//
// ONTAP-style clusters report failures as an HTTP status plus a body
// carrying a stable numeric code and a free-text message. The numeric
// code is the contract: message wording changes between releases, the
// codes do not. `translate` classifies responses by code so callers can
// match on error kind instead of scraping message text.

use serde::Deserialize;
use thiserror::Error;

/// Top-level error type for the `shoal-api` crate.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Authentication ──────────────────────────────────────────────
    /// Credentials rejected by the cluster.
    #[error("Authentication rejected by cluster (HTTP {status})")]
    Authentication { status: u16 },

    // ── Remote object state ─────────────────────────────────────────
    /// The addressed remote object does not exist.
    #[error("Remote object not found: {message}")]
    NotFound { message: String },

    /// A single record was expected but the query matched several.
    #[error("Expected at most one record, got {count}")]
    TooManyRecords { count: usize },

    // ── Typed remote errors (classified by numeric code) ────────────
    /// A referenced parent object (SVM, aggregate, ...) does not exist.
    #[error("Referenced object not found (code {code}): {message}")]
    ReferenceNotFound { code: u64, message: String },

    /// The requested name is already in use.
    #[error("Name conflict (code {code}): {message}")]
    Conflict { code: u64, message: String },

    /// The cluster rejected the request body as invalid.
    #[error("Validation rejected (code {code}): {message}")]
    Validation { code: u64, message: String },

    /// Any other cluster-reported error.
    #[error("Cluster error (HTTP {status}, code {code:?}): {message}")]
    Remote {
        status: u16,
        code: Option<u64>,
        message: String,
    },

    // ── Async jobs ──────────────────────────────────────────────────
    /// An async job did not reach a terminal state in time.
    #[error("Job {uuid} did not complete within {timeout_secs}s")]
    JobTimeout { uuid: String, timeout_secs: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the addressed object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Extract the remote numeric code, if one was reported.
    pub fn remote_code(&self) -> Option<u64> {
        match self {
            Self::ReferenceNotFound { code, .. }
            | Self::Conflict { code, .. }
            | Self::Validation { code, .. } => Some(*code),
            Self::Remote { code, .. } => *code,
            _ => None,
        }
    }
}

// ── Classification tables ────────────────────────────────────────────
//
// Extending coverage for a newly observed code means adding it here;
// nothing else changes.

/// "Parent object not found" family (e.g. 2621462: SVM does not exist).
const REFERENCE_NOT_FOUND_CODES: &[u64] = &[2_621_462, 2_621_706, 917_927];

/// "Name already in use" family.
const CONFLICT_CODES: &[u64] = &[17_829_888, 2_621_697, 13_001];

/// "Request body rejected" family.
const VALIDATION_CODES: &[u64] = &[917_525, 262_197, 262_186];

// ── Error body shape ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Pull the numeric code out of the `code` field, which older releases
/// serialize as a string and newer ones as a number.
fn code_from_field(code: &serde_json::Value) -> Option<u64> {
    match code {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Scan free text for the first run of four or more consecutive digits.
///
/// Some cluster responses only embed the code inside the human message
/// ("... Reason: entry doesn't exist (2621462) ..."). Short digit runs
/// are skipped so incidental numbers (ports, counts) are not mistaken
/// for error codes.
fn code_from_message(message: &str) -> Option<u64> {
    let bytes = message.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start >= 4 {
                if let Ok(code) = message[start..i].parse() {
                    return Some(code);
                }
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Classify a non-success response into the typed error taxonomy.
pub fn translate(status: u16, raw_body: &str) -> Error {
    if status == 401 {
        return Error::Authentication { status };
    }

    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(raw_body) {
        Ok(ErrorEnvelope { error: Some(body) }) => {
            let message = body.message.unwrap_or_else(|| raw_body.to_owned());
            let code = body
                .code
                .as_ref()
                .and_then(code_from_field)
                .or_else(|| code_from_message(&message));
            (code, message)
        }
        _ => (code_from_message(raw_body), raw_body.to_owned()),
    };

    // On a 404 the addressed object itself is absent; that wins over
    // the code table so idempotent callers (delete) see NotFound even
    // when the body carries a classified code.
    if status == 404 {
        return Error::NotFound { message };
    }

    match code {
        Some(code) if REFERENCE_NOT_FOUND_CODES.contains(&code) => {
            Error::ReferenceNotFound { code, message }
        }
        Some(code) if CONFLICT_CODES.contains(&code) => Error::Conflict { code, message },
        Some(code) if VALIDATION_CODES.contains(&code) => Error::Validation { code, message },
        _ => Error::Remote {
            status,
            code,
            message,
        },
    }
}

/// Classify a failed async job by its reported code and message.
pub fn translate_job(code: Option<u64>, message: &str) -> Error {
    let code = code.or_else(|| code_from_message(message));
    match code {
        Some(code) if REFERENCE_NOT_FOUND_CODES.contains(&code) => Error::ReferenceNotFound {
            code,
            message: message.to_owned(),
        },
        Some(code) if CONFLICT_CODES.contains(&code) => Error::Conflict {
            code,
            message: message.to_owned(),
        },
        Some(code) if VALIDATION_CODES.contains(&code) => Error::Validation {
            code,
            message: message.to_owned(),
        },
        code => Error::Remote {
            status: 0,
            code,
            message: message.to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_not_found_from_error_body() {
        let body = r#"{"error": {"code": "2621462", "message": "SVM \"carchi-test\" does not exist."}}"#;
        let err = translate(400, body);
        match err {
            Error::ReferenceNotFound { code, .. } => assert_eq!(code, 2_621_462),
            other => panic!("expected ReferenceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn coded_404_body_is_still_not_found() {
        // The body's classified code must not shadow the absent object.
        let body = r#"{"error": {"code": "917927", "message": "volume not found"}}"#;
        let err = translate(404, body);
        assert!(err.is_not_found());
    }

    #[test]
    fn code_embedded_in_message_text() {
        let body = r#"{"error": {"message": "create failed, reason: entry does not exist (2621462)"}}"#;
        let err = translate(400, body);
        assert_eq!(err.remote_code(), Some(2_621_462));
        assert!(matches!(err, Error::ReferenceNotFound { .. }));
    }

    #[test]
    fn numeric_code_field() {
        let body = r#"{"error": {"code": 917525, "message": "invalid size"}}"#;
        assert!(matches!(translate(400, body), Error::Validation { .. }));
    }

    #[test]
    fn unknown_code_falls_through_to_remote() {
        let body = r#"{"error": {"code": "99999", "message": "something odd"}}"#;
        match translate(500, body) {
            Error::Remote { status, code, .. } => {
                assert_eq!(status, 500);
                assert_eq!(code, Some(99_999));
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn bare_404_is_not_found() {
        assert!(translate(404, "").is_not_found());
    }

    #[test]
    fn unauthorized_is_authentication() {
        assert!(matches!(
            translate(401, "whatever"),
            Error::Authentication { status: 401 }
        ));
    }

    #[test]
    fn short_digit_runs_are_not_codes() {
        // "60" (return_timeout echo) must not classify as a code.
        assert_eq!(code_from_message("timed out after 60 seconds"), None);
        assert_eq!(code_from_message("code 2621462 reported"), Some(2_621_462));
    }
}
