//! Failure classification
//!
//! Maps an arbitrary failure message onto a small taxonomy with user-facing
//! guidance and a retry hint. The rules are an ordered data table over the
//! lowercased message; the first match wins, and new upstream phrasings are
//! added to the table rather than to control flow.

use serde::Serialize;

/// Maximum raw detail forwarded to the client for uncategorized failures
const MAX_SERVER_MESSAGE_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Quota,
    Timeout,
    Network,
    Model,
    Server,
    Configuration,
    MalformedResponse,
    MissingFields,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Quota => "quota",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::Model => "model",
            ErrorKind::Server => "server",
            ErrorKind::Configuration => "configuration",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::MissingFields => "missing_fields",
        }
    }
}

/// Normalized failure description delivered to the client
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClassifiedError {
    pub category: ErrorKind,
    pub title: String,
    pub message: String,
    pub action: String,
    pub retry_allowed: bool,
}

struct Rule {
    keywords: &'static [&'static str],
    category: ErrorKind,
    title: &'static str,
    message: &'static str,
    action: &'static str,
    retry_allowed: bool,
}

/// Ordered, mutually exclusive by construction of the keyword sets
const RULES: &[Rule] = &[
    Rule {
        keywords: &[
            "api key",
            "apikey",
            "unauthorized",
            "authentication",
            "invalid_api_key",
        ],
        category: ErrorKind::Auth,
        title: "Invalid API key",
        message: "The model provider rejected the API key.",
        action: "Check the API key in Settings or the server configuration.",
        retry_allowed: false,
    },
    Rule {
        keywords: &[
            "rate limit",
            "rate_limit",
            "quota",
            "too many requests",
            "billing",
        ],
        category: ErrorKind::Quota,
        title: "Rate limit reached",
        message: "The model provider rejected the request due to rate or quota limits.",
        action: "Wait a moment and try again, or check your provider usage limits.",
        retry_allowed: true,
    },
    Rule {
        keywords: &["timed out", "timeout", "deadline exceeded"],
        category: ErrorKind::Timeout,
        title: "Request timed out",
        message: "The model took too long to respond.",
        action: "Try again; large images or provider load can cause timeouts.",
        retry_allowed: true,
    },
    Rule {
        keywords: &[
            "connection",
            "connect error",
            "network",
            "dns",
            "unreachable",
        ],
        category: ErrorKind::Network,
        title: "Connection problem",
        message: "Could not reach the model provider.",
        action: "Check the server's network connectivity and try again.",
        retry_allowed: true,
    },
    Rule {
        keywords: &[
            "model_not_found",
            "does not exist",
            "no such model",
            "model is not available",
        ],
        category: ErrorKind::Model,
        title: "Model unavailable",
        message: "The configured model is not available for this account.",
        action: "Switch to an available model in the server configuration.",
        retry_allowed: false,
    },
];

/// Classify a raw failure message. Anything the rule table does not cover
/// falls through to `server` with the (truncated) raw detail attached.
pub fn classify(raw: &str) -> ClassifiedError {
    let normalized = raw.to_lowercase();

    for rule in RULES {
        if rule.keywords.iter().any(|kw| normalized.contains(kw)) {
            return ClassifiedError {
                category: rule.category,
                title: rule.title.to_string(),
                message: rule.message.to_string(),
                action: rule.action.to_string(),
                retry_allowed: rule.retry_allowed,
            };
        }
    }

    ClassifiedError {
        category: ErrorKind::Server,
        title: "Generation failed".to_string(),
        message: truncate(raw, MAX_SERVER_MESSAGE_LEN),
        action: "Try again; report the problem if it persists.".to_string(),
        retry_allowed: true,
    }
}

impl ClassifiedError {
    /// Locally raised: the requested profile does not exist
    pub fn configuration(profile_id: &str) -> Self {
        Self {
            category: ErrorKind::Configuration,
            title: "Unknown profile".to_string(),
            message: format!("No processing profile named '{profile_id}' exists."),
            action: "Select one of the configured profiles.".to_string(),
            retry_allowed: false,
        }
    }

    /// Locally raised: the model output was empty or not parseable
    pub fn malformed_response(detail: &str) -> Self {
        Self {
            category: ErrorKind::MalformedResponse,
            title: "Unusable model response".to_string(),
            message: truncate(detail, MAX_SERVER_MESSAGE_LEN),
            action: "Try again; the model occasionally returns malformed output.".to_string(),
            retry_allowed: true,
        }
    }

    /// Locally raised: the model output violated the profile contract
    pub fn missing_fields(fields: &[String]) -> Self {
        Self {
            category: ErrorKind::MissingFields,
            title: "Incomplete model response".to_string(),
            message: format!("The model response is missing: {}", fields.join(", ")),
            action: "Try again; the model occasionally omits required fields.".to_string(),
            retry_allowed: true,
        }
    }
}

fn truncate(message: &str, max_len: usize) -> String {
    if message.len() <= max_len {
        return message.to_string();
    }
    let mut end = max_len;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &message[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_not_retryable() {
        let err = classify("HTTP 401: Incorrect API key provided");
        assert_eq!(err.category, ErrorKind::Auth);
        assert!(!err.retry_allowed);
    }

    #[test]
    fn quota_errors_are_retryable() {
        let err = classify("HTTP 429: Rate limit exceeded for requests");
        assert_eq!(err.category, ErrorKind::Quota);
        assert!(err.retry_allowed);

        let err = classify("You exceeded your current quota");
        assert_eq!(err.category, ErrorKind::Quota);
    }

    #[test]
    fn timeouts_and_network_failures_are_retryable() {
        let err = classify("operation timed out");
        assert_eq!(err.category, ErrorKind::Timeout);
        assert!(err.retry_allowed);

        let err = classify("error sending request: connection refused");
        assert_eq!(err.category, ErrorKind::Network);
        assert!(err.retry_allowed);
    }

    #[test]
    fn unavailable_model_is_not_retryable() {
        let err = classify("The model `gpt-9` does not exist or you do not have access to it");
        assert_eq!(err.category, ErrorKind::Model);
        assert!(!err.retry_allowed);
    }

    #[test]
    fn unknown_errors_fall_through_to_server() {
        let err = classify("something completely unexpected happened");
        assert_eq!(err.category, ErrorKind::Server);
        assert!(err.retry_allowed);
        assert!(err.message.contains("unexpected"));
    }

    #[test]
    fn first_matching_rule_wins() {
        // "api key" appears before the quota keywords in the table
        let err = classify("api key is over its usage quota");
        assert_eq!(err.category, ErrorKind::Auth);
    }

    #[test]
    fn server_message_is_truncated() {
        let long = "x".repeat(1000);
        let err = classify(&long);
        assert_eq!(err.category, ErrorKind::Server);
        assert!(err.message.len() < 250);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let err = classify("UNAUTHORIZED");
        assert_eq!(err.category, ErrorKind::Auth);
    }

    #[test]
    fn missing_fields_lists_every_field() {
        let err = ClassifiedError::missing_fields(&["title".to_string(), "tags".to_string()]);
        assert_eq!(err.category, ErrorKind::MissingFields);
        assert!(err.message.contains("title, tags"));
    }
}
