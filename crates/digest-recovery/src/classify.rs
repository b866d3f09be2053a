use std::fmt;

/// Coarse failure category driving the retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Auth,
    RateLimit,
    Network,
    Service,
    Permission,
    InvalidRequest,
    Unknown,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "AUTH_ERROR",
            Self::RateLimit => "RATE_LIMIT",
            Self::Network => "NETWORK_ERROR",
            Self::Service => "SERVICE_ERROR",
            Self::Permission => "PERMISSION_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Whether a failure with this code may be retried after `attempt`
    /// earlier attempts.
    #[must_use]
    pub fn is_recoverable_at(self, attempt: u32) -> bool {
        match self {
            Self::RateLimit | Self::Network => true,
            Self::Auth | Self::Service => attempt < 2,
            Self::Unknown => attempt == 0,
            Self::Permission | Self::InvalidRequest => false,
        }
    }

    fn user_message(self) -> &'static str {
        match self {
            Self::Auth => "Authentication failed. Check the configured credentials.",
            Self::RateLimit => "The upstream service is rate limiting requests.",
            Self::Network => "A network problem interrupted the request.",
            Self::Service => "The upstream service is temporarily unavailable.",
            Self::Permission => "The credentials lack permission for this operation.",
            Self::InvalidRequest => "The upstream service rejected the request as invalid.",
            Self::Unknown => "An unexpected error occurred.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of inspecting one failure at one attempt number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassification {
    pub recoverable: bool,
    pub code: ErrorCode,
    pub user_message: String,
}

struct Signals {
    code: ErrorCode,
    phrases: &'static [&'static str],
    status_codes: &'static [&'static str],
}

// Checked in order; the first match wins. Service comes before network so
// that "gateway timeout" is not read as a plain timeout.
const SIGNALS: &[Signals] = &[
    Signals {
        code: ErrorCode::RateLimit,
        phrases: &[
            "rate limit",
            "rate-limit",
            "ratelimit",
            "rate_limit",
            "too many requests",
            "quota",
            "throttl",
        ],
        status_codes: &["429"],
    },
    Signals {
        code: ErrorCode::Auth,
        phrases: &[
            "unauthorized",
            "unauthenticated",
            "authentication",
            "credential",
            "expired token",
            "token expired",
            "token has expired",
            "invalid token",
            "invalid api key",
            "invalid_api_key",
        ],
        status_codes: &["401"],
    },
    Signals {
        code: ErrorCode::Permission,
        phrases: &["forbidden", "permission", "access denied", "not allowed"],
        status_codes: &["403"],
    },
    Signals {
        code: ErrorCode::InvalidRequest,
        phrases: &[
            "invalid request",
            "invalid_request",
            "bad request",
            "malformed",
            "unprocessable",
        ],
        status_codes: &["400", "422"],
    },
    Signals {
        code: ErrorCode::Service,
        phrases: &[
            "service unavailable",
            "internal server error",
            "bad gateway",
            "gateway timeout",
            "overloaded",
            "server error",
        ],
        status_codes: &["500", "502", "503", "504"],
    },
    Signals {
        code: ErrorCode::Network,
        phrases: &[
            "connection reset",
            "connection refused",
            "connection closed",
            "connection aborted",
            "econnreset",
            "econnrefused",
            "etimedout",
            "enotfound",
            "timed out",
            "timeout",
            "dns",
            "broken pipe",
            "network",
        ],
        status_codes: &[],
    },
];

/// Classify a failure message after `attempt` earlier attempts.
///
/// Matching is case-insensitive. Status codes only match as whole tokens,
/// so `"request 4290"` is not a rate limit.
#[must_use]
pub fn classify_message(message: &str, attempt: u32) -> ErrorClassification {
    let lower = message.to_lowercase();
    let code = SIGNALS
        .iter()
        .find(|signals| {
            signals.phrases.iter().any(|p| lower.contains(p))
                || lower
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .any(|token| signals.status_codes.contains(&token))
        })
        .map_or(ErrorCode::Unknown, |signals| signals.code);

    ErrorClassification {
        recoverable: code.is_recoverable_at(attempt),
        code,
        user_message: code.user_message().to_string(),
    }
}

/// Classify an error by its alternate `Display` text, which includes the
/// source chain for `anyhow` errors.
#[must_use]
pub fn classify(error: &impl fmt::Display, attempt: u32) -> ErrorClassification {
    classify_message(&format!("{error:#}"), attempt)
}
