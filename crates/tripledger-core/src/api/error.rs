use thiserror::Error;

/// Errors returned by the identity provider client.
///
/// Expected provider failures (invalid credentials, unconfirmed email, rate
/// limiting) are `Api` with the provider's own message preserved verbatim:
/// the auth flow classifies that free text to decide what to show. Only
/// transport problems and malformed payloads use the other variants.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl BackendError {
    /// Truncate a response body to avoid logging excessive data.
    /// The cut backs off to a char boundary so multibyte bodies never
    /// split a character.
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..end],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        // GoTrue-style providers put the human message under one of a few
        // keys; fall back to the raw body when the shape is unfamiliar.
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                ["msg", "message", "error_description", "error"]
                    .iter()
                    .find_map(|k| v.get(k).and_then(|m| m.as_str()).map(str::to_string))
            })
            .unwrap_or_else(|| Self::truncate_body(body));

        BackendError::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// True when this is an expected provider rejection rather than a
    /// transport or parsing failure.
    pub fn is_api(&self) -> bool {
        matches!(self, BackendError::Api { .. })
    }
}
