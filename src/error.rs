use thiserror::Error;

/// Failure of a single call against the remote item source.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("request timed out")]
    Timeout,

    #[error("network failure: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    /// The owning view context moved on. Never shown to the user.
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// The single line shown in an error banner.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::NotFound(what) => format!("{} not found", capitalize(what)),
            FetchError::Timeout => "The request timed out. Please try again.".to_string(),
            FetchError::Network(_) | FetchError::Decode(_) => {
                "Failed to reach Hacker News. Please try again later.".to_string()
            }
            FetchError::Cancelled => String::new(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_subject() {
        let err = FetchError::NotFound("user pg".to_string());
        assert_eq!(err.user_message(), "User pg not found");
    }

    #[test]
    fn transport_failures_share_one_message() {
        let network = FetchError::Network("reset".into()).user_message();
        let decode = FetchError::Decode("bad json".into()).user_message();
        assert_eq!(network, decode);
        assert!(FetchError::Cancelled.user_message().is_empty());
    }
}
