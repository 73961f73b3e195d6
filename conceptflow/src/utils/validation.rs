//! Validation of caller-supplied process names.
//!
//! Process names key filesystem paths in the artifact store, so they are
//! restricted to a conservative character set.

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::ConfigError;

/// Maximum length of a process name.
pub const MAX_PROCESS_NAME_LEN: usize = 128;

fn process_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap_or_else(|e| {
            unreachable!("process name pattern is a valid regex: {e}")
        })
    })
}

/// Validates a process name.
///
/// Names must start with an ASCII letter or digit, contain only letters,
/// digits, `_`, `.` and `-`, must not contain `..` and are at most
/// [`MAX_PROCESS_NAME_LEN`] bytes long.
pub fn validate_process_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::invalid_process_name(
            name,
            "name cannot be empty or whitespace-only",
        ));
    }
    if name.len() > MAX_PROCESS_NAME_LEN {
        return Err(ConfigError::invalid_process_name(
            name,
            "name is longer than 128 characters",
        ));
    }
    if name.contains("..") {
        return Err(ConfigError::invalid_process_name(name, "name cannot contain '..'"));
    }
    if !process_name_pattern().is_match(name) {
        return Err(ConfigError::invalid_process_name(
            name,
            "only letters, digits, '_', '.' and '-' are allowed",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["default", "corpus1", "Corpus_2024.v2", "a-b"] {
            assert!(validate_process_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_rejects_path_like_names() {
        for name in ["", "   ", "../etc", "a/b", "a\\b", ".hidden", "x..y"] {
            assert!(validate_process_name(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_rejects_overlong_names() {
        let name = "a".repeat(MAX_PROCESS_NAME_LEN + 1);
        let err = validate_process_name(&name).unwrap_err();
        assert!(err.message.contains("longer"));
    }
}
