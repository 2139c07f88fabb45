use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Debug)]
pub enum OriginError {
    Http(reqwest::Error),
    Timeout,
    Api {
        status: StatusCode,
        message: String,
    },
    Decode(serde_json::Error),
    Stream(String),
}

impl OriginError {
    fn http(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OriginError::Timeout
        } else {
            OriginError::Http(err)
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        Self::http(err)
    }

    /// Builds an API error from a non-success body, keeping the origin's own wording.
    pub(crate) fn from_body(status: StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ApiErrorBody>(body)
            .ok()
            .and_then(ApiErrorBody::into_message)
            .unwrap_or_else(|| {
                let text = String::from_utf8_lossy(body).trim().to_string();
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                } else {
                    text
                }
            });
        OriginError::Api { status, message }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, OriginError::Api { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS)
    }

    /// The text an operator should see for this failure.
    pub fn message(&self) -> String {
        match self {
            OriginError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for OriginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginError::Http(err) => write!(f, "http error: {err}"),
            OriginError::Timeout => write!(f, "request timeout"),
            OriginError::Api { status, message } => write!(f, "origin error {status}: {message}"),
            OriginError::Decode(err) => write!(f, "decode error: {err}"),
            OriginError::Stream(reason) => write!(f, "stream error: {reason}"),
        }
    }
}

impl std::error::Error for OriginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OriginError::Http(err) => Some(err),
            OriginError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl ApiErrorBody {
    fn into_message(self) -> Option<String> {
        if let Some(error) = self.error {
            return Some(error);
        }
        match self.detail? {
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_body_prefers_error_field() {
        let err = OriginError::from_body(StatusCode::BAD_REQUEST, br#"{"error":"trip not found"}"#);
        assert_eq!(err.message(), "trip not found");
        assert_eq!(format!("{err}"), "origin error 400 Bad Request: trip not found");
    }

    #[test]
    fn from_body_reads_detail_and_plain_text() {
        let err = OriginError::from_body(StatusCode::BAD_GATEWAY, br#"{"detail":"quota exceeded"}"#);
        assert_eq!(err.message(), "quota exceeded");

        let err = OriginError::from_body(StatusCode::INTERNAL_SERVER_ERROR, b"boom");
        assert_eq!(err.message(), "boom");

        let err = OriginError::from_body(StatusCode::SERVICE_UNAVAILABLE, b"");
        assert_eq!(err.message(), "Service Unavailable");
    }

    #[test]
    fn only_429_counts_as_rate_limited() {
        assert!(OriginError::from_body(StatusCode::TOO_MANY_REQUESTS, b"").is_rate_limited());
        assert!(!OriginError::from_body(StatusCode::BAD_REQUEST, b"").is_rate_limited());
        assert!(!OriginError::Timeout.is_rate_limited());
    }
}
