use thiserror::Error;

/// Send-call-level failures of an outbound transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Provider did not answer in time
    #[error("request to provider timed out")]
    Timeout,
    /// Request could not be delivered to the provider
    #[error("request to provider failed")]
    Request(#[source] reqwest::Error),
    /// Provider answered with a non-success status
    #[error("provider rejected request with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },
    /// Provider response could not be interpreted
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    /// More tokens were submitted than a single multicast call allows
    #[error("{0} tokens exceed the multicast limit")]
    TooManyTokens(usize),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(error)
        }
    }
}
