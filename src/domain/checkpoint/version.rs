//! Channel version tokens
//!
//! A token is a 32-digit zero-padded sequence number, a `.` and a 16 character
//! hex suffix. Only the numeric prefix is ordered; the suffix separates
//! concurrent writers that computed the same sequence number. Compare tokens
//! with [`version_sequence`], never as whole strings.

use uuid::Uuid;

use crate::domain::DomainError;

const SEQUENCE_WIDTH: usize = 32;
const SUFFIX_LEN: usize = 16;

/// Token following `current` (or the first token when there is none)
pub fn next_version(current: Option<&str>) -> Result<String, DomainError> {
    let sequence = match current {
        Some(token) => parse_sequence(token)?,
        None => 0,
    };

    let next = sequence.checked_add(1).ok_or_else(|| {
        DomainError::validation(format!("Version sequence overflow after '{}'", sequence))
    })?;

    let random = Uuid::new_v4().simple().to_string();
    Ok(format!(
        "{:0width$}.{}",
        next,
        &random[..SUFFIX_LEN],
        width = SEQUENCE_WIDTH
    ))
}

/// Ordered part of a token, `None` when the prefix is not numeric
pub fn version_sequence(token: &str) -> Option<u128> {
    parse_sequence(token).ok()
}

fn parse_sequence(token: &str) -> Result<u128, DomainError> {
    let prefix = token.split('.').next().unwrap_or_default();

    prefix.parse::<u128>().map_err(|_| {
        DomainError::validation(format!("Version token '{}' has no numeric prefix", token))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_version() {
        let token = next_version(None).unwrap();

        assert_eq!(version_sequence(&token), Some(1));
        assert_eq!(token.len(), SEQUENCE_WIDTH + 1 + SUFFIX_LEN);
        assert!(token.starts_with("00000000000000000000000000000001."));
    }

    #[test]
    fn test_sequence_is_strictly_increasing() {
        let mut current = next_version(None).unwrap();

        for _ in 0..1000 {
            let next = next_version(Some(&current)).unwrap();
            assert!(version_sequence(&next) > version_sequence(&current));
            assert_eq!(next.len(), current.len());
            current = next;
        }

        assert_eq!(version_sequence(&current), Some(1001));
    }

    #[test]
    fn test_same_input_yields_distinct_tokens() {
        let current = next_version(None).unwrap();
        let a = next_version(Some(&current)).unwrap();
        let b = next_version(Some(&current)).unwrap();

        assert_ne!(a, b);
        assert_eq!(version_sequence(&a), version_sequence(&b));
    }

    #[test]
    fn test_plain_integer_tokens_are_accepted() {
        let token = next_version(Some("41")).unwrap();
        assert_eq!(version_sequence(&token), Some(42));
    }

    #[test]
    fn test_non_numeric_prefix_is_rejected() {
        let err = next_version(Some("abc.def")).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
        assert_eq!(version_sequence("abc"), None);
    }
}
