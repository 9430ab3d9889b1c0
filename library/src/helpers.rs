//! Various small helper functions

use std::num::ParseIntError;
use std::time::Duration;

/// Parses a Duration from a string containing seconds.
/// Useful for command line parsing
pub fn parse_seconds(src: &str) -> Result<Duration, ParseIntError> {
    let seconds = src.parse::<u64>()?;
    Ok(Duration::from_secs(seconds))
}

/// Compares two byte strings in time independent of where they first differ
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Splits a `<scheme> <credentials>` authorization header value, matching the scheme case-insensitively
pub fn split_authorization<'a>(header: &'a str, scheme: &str) -> Option<&'a str> {
    let (given, credentials) = header.trim().split_once(' ')?;

    if given.eq_ignore_ascii_case(scheme) {
        Some(credentials.trim())
    } else {
        None
    }
}

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn parse_seconds_from_string() {
        assert_eq!(parse_seconds("42").unwrap(), Duration::from_secs(42));
        assert!(parse_seconds("forty-two").is_err());
    }

    #[test]
    fn compare_in_constant_time() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secrets"));
    }

    #[test]
    fn split_authorization_scheme() {
        assert_eq!(split_authorization("Bearer abc", "bearer"), Some("abc"));
        assert_eq!(split_authorization("Basic dXNlcg==", "Basic"), Some("dXNlcg=="));
        assert_eq!(split_authorization("Basic dXNlcg==", "Bearer"), None);
        assert_eq!(split_authorization("garbage", "Bearer"), None);
    }
}
