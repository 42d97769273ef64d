//! Identifier validation shared by the registry and the run layout.
//!
//! Capability names end up in prompts, log fields and artifact file names,
//! so they are held to a small character set.

use thiserror::Error;

/// Character and length rules for an identifier.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierRules {
    pub max_length: usize,
    /// Allow `.` inside the identifier.
    pub allow_dots: bool,
    /// Reject `./` and `../` sequences.
    pub check_path_traversal: bool,
    /// Trim surrounding whitespace instead of rejecting it.
    pub trim_whitespace: bool,
}

impl IdentifierRules {
    /// Capability names: up to 64 of `[A-Za-z0-9_-]`.
    pub const TOOL_NAME: Self = Self {
        max_length: 64,
        allow_dots: false,
        check_path_traversal: true,
        trim_whitespace: true,
    };

    /// Run identifiers used as directory names under the output root.
    pub const RUN_ID: Self = Self {
        max_length: 128,
        allow_dots: true,
        check_path_traversal: true,
        trim_whitespace: false,
    };

    /// Validate `input`, returning the (possibly trimmed) identifier.
    pub fn validate(&self, input: &str) -> Result<String, IdentifierError> {
        let processed = if self.trim_whitespace {
            input.trim()
        } else {
            input
        };

        if processed.is_empty() {
            return Err(IdentifierError::Empty);
        }

        if !self.trim_whitespace && input != input.trim() {
            return Err(IdentifierError::SurroundingWhitespace);
        }

        let length = processed.chars().count();
        if length > self.max_length {
            return Err(IdentifierError::TooLong {
                length,
                max: self.max_length,
            });
        }

        if self.check_path_traversal
            && (processed.contains("../") || processed.contains("./") || processed == "..")
        {
            return Err(IdentifierError::PathTraversal);
        }

        if let Some(ch) = processed
            .chars()
            .find(|&ch| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || (ch == '.' && self.allow_dots)))
        {
            return Err(IdentifierError::InvalidChar {
                ch,
                input: processed.to_string(),
            });
        }

        Ok(processed.to_string())
    }
}

/// Reasons an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier cannot be empty")]
    Empty,
    #[error("identifier cannot have leading or trailing whitespace")]
    SurroundingWhitespace,
    #[error("identifier too long: {length} characters (max {max})")]
    TooLong { length: usize, max: usize },
    #[error("identifier '{input}' contains invalid character '{ch}'")]
    InvalidChar { ch: char, input: String },
    #[error("identifier cannot contain path traversal sequences")]
    PathTraversal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_are_trimmed() {
        assert_eq!(IdentifierRules::TOOL_NAME.validate("  search ").unwrap(), "search");
        assert_eq!(IdentifierRules::TOOL_NAME.validate("code-runner_2").unwrap(), "code-runner_2");
    }

    #[test]
    fn tool_names_reject_bad_input() {
        let rules = IdentifierRules::TOOL_NAME;
        assert_eq!(rules.validate("   "), Err(IdentifierError::Empty));
        assert!(matches!(rules.validate("web search"), Err(IdentifierError::InvalidChar { ch: ' ', .. })));
        assert!(matches!(rules.validate("web.search"), Err(IdentifierError::InvalidChar { ch: '.', .. })));
        assert!(matches!(rules.validate(&"a".repeat(65)), Err(IdentifierError::TooLong { length: 65, max: 64 })));
    }

    #[test]
    fn run_ids_reject_traversal_and_whitespace() {
        let rules = IdentifierRules::RUN_ID;
        assert_eq!(rules.validate("../etc"), Err(IdentifierError::PathTraversal));
        assert_eq!(rules.validate(".."), Err(IdentifierError::PathTraversal));
        assert_eq!(rules.validate(" run"), Err(IdentifierError::SurroundingWhitespace));
        assert_eq!(rules.validate("run-2024.01").unwrap(), "run-2024.01");
    }
}
