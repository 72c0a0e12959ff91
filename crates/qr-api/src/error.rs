//! Error types for QR-request calls

use guest_gateway::ApiResponse;

const FALLBACK_MESSAGE: &str = "An unexpected error occurred.";

/// Errors from QR-request and session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Gateway(#[from] guest_gateway::Error),

    /// Backend answered with a non-2xx status.
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("authentication failed: {0}")]
    Auth(#[from] guest_auth::Error),
}

impl Error {
    /// Build an `Api` error from a non-2xx response.
    pub(crate) fn from_response(response: &ApiResponse) -> Self {
        Error::Api {
            status: response.status.as_u16(),
            message: extract_error_message(&response.body),
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Error::Api { message, .. } => message.clone(),
            Error::Gateway(e) => match e.response() {
                Some(response) => extract_error_message(&response.body),
                None => e.to_string(),
            },
            Error::Auth(guest_auth::Error::Rejected { body, .. }) => {
                extract_error_message(body.as_bytes())
            }
            other => other.to_string(),
        }
    }
}

/// Result alias for QR-request operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pull a human-readable message out of an error body.
///
/// Tries, in order: a JSON string body, `detail`, `novus` (access-control
/// system failures), then field validation errors rendered as
/// `field: a, b` joined by `"; "`. A top-level JSON list is read the same
/// way with each position as the field name. Non-JSON bodies are returned
/// as text.
pub fn extract_error_message(body: &[u8]) -> String {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            return if text.is_empty() {
                FALLBACK_MESSAGE.to_string()
            } else {
                text
            };
        }
    };

    if let Some(text) = value.as_str() {
        return text.to_string();
    }
    let entries: Vec<(String, &serde_json::Value)> = match &value {
        serde_json::Value::Object(fields) => {
            for key in ["detail", "novus"] {
                if let Some(text) = fields.get(key).and_then(|v| v.as_str()) {
                    return text.to_string();
                }
            }
            fields.iter().map(|(k, v)| (k.clone(), v)).collect()
        }
        // A bare list of errors is keyed by position
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => return FALLBACK_MESSAGE.to_string(),
    };

    let messages: Vec<String> = entries
        .into_iter()
        .filter_map(|(field, value)| match value {
            serde_json::Value::Array(items) => {
                let items: Vec<String> = items.iter().map(list_item).collect();
                Some(format!("{field}: {}", items.join(", ")))
            }
            serde_json::Value::String(text) => Some(format!("{field}: {text}")),
            _ => None,
        })
        .collect();
    if messages.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        messages.join("; ")
    }
}

/// One entry of a field's error list. Non-string entries keep their JSON text.
fn list_item(item: &serde_json::Value) -> String {
    match item {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_wins() {
        let body = br#"{"detail":"You do not have permission to perform this action."}"#;
        assert_eq!(
            extract_error_message(body),
            "You do not have permission to perform this action."
        );
    }

    #[test]
    fn novus_failure_is_reported() {
        let body = br#"{"novus":"Access control system unavailable"}"#;
        assert_eq!(
            extract_error_message(body),
            "Access control system unavailable"
        );
    }

    #[test]
    fn field_errors_are_joined() {
        let body = br#"{"guest_email":["Enter a valid email address."],"guest_name":["This field is required.","Too short."]}"#;
        assert_eq!(
            extract_error_message(body),
            "guest_email: Enter a valid email address.; guest_name: This field is required., Too short."
        );
    }

    #[test]
    fn json_string_body_is_used_verbatim() {
        assert_eq!(extract_error_message(br#""Server exploded""#), "Server exploded");
    }

    #[test]
    fn plain_text_body_is_used() {
        assert_eq!(extract_error_message(b"Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn empty_or_unhelpful_bodies_fall_back() {
        assert_eq!(extract_error_message(b""), FALLBACK_MESSAGE);
        assert_eq!(extract_error_message(b"{\"code\":42}"), FALLBACK_MESSAGE);
        assert_eq!(extract_error_message(b"[1,2]"), FALLBACK_MESSAGE);
    }

    #[test]
    fn bare_error_list_is_keyed_by_position() {
        let body = br#"["Request is no longer pending.","QR code not issued."]"#;
        assert_eq!(
            extract_error_message(body),
            "0: Request is no longer pending.; 1: QR code not issued."
        );
    }

    #[test]
    fn non_string_list_entries_are_kept() {
        let body = br#"{"page":[3,"out of range",null,{"max":2}]}"#;
        assert_eq!(
            extract_error_message(body),
            r#"page: 3, out of range, , {"max":2}"#
        );
    }

    #[test]
    fn api_error_user_message_is_the_extracted_text() {
        let err = Error::Api {
            status: 400,
            message: "guest_email: Enter a valid email address.".into(),
        };
        assert_eq!(err.user_message(), "guest_email: Enter a valid email address.");
        assert!(err.to_string().starts_with("backend returned 400"));
    }
}
