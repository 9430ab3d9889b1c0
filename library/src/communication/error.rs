use crate::BoxedError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::iter::successors;

/// Serialisable snapshot of an error and all of its causes, outermost first
///
/// Nested snapshots found in the chain are spliced in, so the list stays flat no matter how often
/// an error crossed a component boundary. Consumer failures are logged in this form and internal
/// API errors carry it as their detail.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct BlackboxError(Vec<String>);

impl BlackboxError {
    /// Captures the chain of a concrete error
    pub fn new<E: Error + 'static>(error: E) -> Self {
        Self::capture(&error)
    }

    /// Captures the chain of a boxed error
    pub fn from_boxed(error: BoxedError) -> Self {
        Self::capture(error.as_ref())
    }

    /// Error messages, outermost first
    pub fn causes(&self) -> &[String] {
        &self.0
    }

    fn capture(error: &(dyn Error + 'static)) -> Self {
        let causes = successors(Some(error), |&error| error.source())
            .flat_map(|error| match error.downcast_ref::<BlackboxError>() {
                Some(nested) => nested.0.clone(),
                None => vec![error.to_string()],
            })
            .collect();

        Self(causes)
    }
}

impl Error for BlackboxError {}

impl Display for BlackboxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => f.write_str("unknown error"),
            [only] => f.write_str(only),
            [outer, causes @ ..] => write!(f, "{} (caused by: {})", outer, causes.join(": ")),
        }
    }
}

impl From<&(dyn Error + 'static)> for BlackboxError {
    fn from(error: &(dyn Error + 'static)) -> Self {
        Self::capture(error)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum TestError {
        #[error("store unavailable")]
        Store(#[from] BlackboxError),
        #[error("dispatch failed")]
        Io(#[source] std::io::Error),
    }

    #[test]
    fn format_without_causes() {
        assert_eq!(BlackboxError(Vec::new()).to_string(), "unknown error");
    }

    #[test]
    fn flatten_nested_chains() {
        let lower = BlackboxError(vec!["connection refused".into(), "os error 111".into()]);
        let error = BlackboxError::new(TestError::from(lower));

        assert_eq!(
            error.causes(),
            &["store unavailable", "connection refused", "os error 111"]
        );
        assert_eq!(
            error.to_string(),
            "store unavailable (caused by: connection refused: os error 111)"
        );
    }

    #[test]
    fn follow_boxed_source_chains() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline elapsed");
        let boxed: BoxedError = Box::new(TestError::Io(io));

        assert_eq!(
            BlackboxError::from_boxed(boxed).causes(),
            &["dispatch failed", "deadline elapsed"]
        );
    }
}
