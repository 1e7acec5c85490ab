//! JSON envelopes for a request-handling layer.
//!
//! A successful extraction becomes `{data, message, success: true}` and a
//! failed one `{message, success: false}`; there is no partial success.

use crate::core::error::PDFResult;
use crate::core::extract::ExtractionResult;
use base64::Engine;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Prefix of `data:` URLs carrying a PDF.
const DATA_URL_PREFIX: &str = "data:application/pdf;base64,";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<ExtractionResult>,
    pub message: String,
    pub success: bool,
}

impl ExtractionResponse {
    /// Wraps an extraction outcome. `name` only appears in the message.
    pub fn from_result(name: &str, result: PDFResult<ExtractionResult>) -> Self {
        match result {
            Ok(data) => {
                let runs = data.runs().count();
                let images = data.images().count();
                ExtractionResponse {
                    message: format!(
                        "Successfully processed {}: {} pages, {} text runs, {} images",
                        name,
                        data.pages.len(),
                        runs,
                        images
                    ),
                    data: Some(data),
                    success: true,
                }
            }
            Err(e) => ExtractionResponse {
                data: None,
                message: format!("Failed to process {}: {}", name, e),
                success: false,
            },
        }
    }
}

/// Health report built from [`crate::self_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `healthy` or `unhealthy: <message>`
    pub status: String,
}

impl HealthStatus {
    pub fn from_check(check: Result<(), String>) -> Self {
        let status = match check {
            Ok(()) => "healthy".to_string(),
            Err(message) => format!("unhealthy: {}", message),
        };
        HealthStatus { status }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Accepts a request payload that is either raw PDF bytes or base64.
///
/// Payloads starting with `%PDF` (after leading whitespace) are used as is.
/// Anything else is tried as standard base64, optionally as a `data:` URL;
/// if that fails the bytes are passed through and the parser reports the
/// problem.
pub fn payload_bytes(payload: &[u8]) -> Cow<'_, [u8]> {
    let trimmed = payload.trim_ascii();
    if trimmed.starts_with(b"%PDF") {
        return Cow::Borrowed(payload);
    }

    let text = trimmed
        .strip_prefix(DATA_URL_PREFIX.as_bytes())
        .unwrap_or(trimmed);
    let compact: Vec<u8> = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    match general_purpose::STANDARD.decode(&compact) {
        Ok(decoded) => {
            log::debug!("Decoded {} byte base64 payload", payload.len());
            Cow::Owned(decoded)
        }
        Err(e) => {
            log::debug!("Payload is neither PDF nor base64 ({}), passing through", e);
            Cow::Borrowed(payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PDFError;

    #[test]
    fn test_raw_pdf_payload_is_borrowed() {
        let payload = b"%PDF-1.7\n...";
        assert!(matches!(payload_bytes(payload), Cow::Borrowed(_)));
    }

    #[test]
    fn test_base64_payload_is_decoded() {
        let encoded = general_purpose::STANDARD.encode(b"%PDF-1.4\nbody");
        assert_eq!(payload_bytes(encoded.as_bytes()).as_ref(), b"%PDF-1.4\nbody");

        let url = format!("{}{}\n", DATA_URL_PREFIX, encoded);
        assert_eq!(payload_bytes(url.as_bytes()).as_ref(), b"%PDF-1.4\nbody");
    }

    #[test]
    fn test_garbage_passes_through() {
        assert_eq!(payload_bytes(b"not a pdf!").as_ref(), b"not a pdf!");
    }

    #[test]
    fn test_failure_envelope_has_no_data() {
        let response = ExtractionResponse::from_result("x.pdf", Err(PDFError::Encrypted));
        assert!(!response.success);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().starts_with("Failed to process x.pdf"));
    }

    #[test]
    fn test_health_status() {
        assert!(HealthStatus::from_check(Ok(())).is_healthy());
        let unhealthy = HealthStatus::from_check(Err("no runs".to_string()));
        assert_eq!(unhealthy.status, "unhealthy: no runs");
    }
}
