//! Transport failure classification shared by the lookup tools.

/// Why an outbound request produced no response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transport {
    Connect,
    Timeout,
    Other(String),
}

impl From<reqwest::Error> for Transport {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Connect
        } else if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Other(err.to_string())
        }
    }
}
