//! Exchange-side rejection errors.

use serde::Deserialize;
use thiserror::Error;

/// The exchange answered with an error payload.
///
/// Distinguishes "the exchange said no" from transport failures, which
/// surface as plain `anyhow` errors and leave an order's fate unknown.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Binance API error {code} (HTTP {status}): {msg}")]
pub struct ApiError {
    pub status: u16,
    pub code: i64,
    pub msg: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    msg: String,
}

impl ApiError {
    /// Insufficient balance for the requested action.
    pub const INSUFFICIENT_BALANCE: i64 = -2010;
    /// Filter failure (LOT_SIZE, NOTIONAL, ...).
    pub const FILTER_FAILURE: i64 = -1013;

    /// Build from an HTTP status and raw response body.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self {
                status,
                code: parsed.code,
                msg: parsed.msg,
            },
            Err(_) => Self {
                status,
                code: 0,
                msg: body.chars().take(200).collect(),
            },
        }
    }

    /// Server-side failures (5xx) may still have executed the order.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binance_error_body() {
        let err = ApiError::from_body(400, r#"{"code":-1013,"msg":"Filter failure: NOTIONAL"}"#);
        assert_eq!(err.code, ApiError::FILTER_FAILURE);
        assert_eq!(err.msg, "Filter failure: NOTIONAL");
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_unparseable_body_kept_as_message() {
        let err = ApiError::from_body(502, "Bad Gateway");
        assert_eq!(err.code, 0);
        assert_eq!(err.msg, "Bad Gateway");
        assert!(err.is_server_error());
    }
}
