//! Password Strength Policy
//!
//! Checks a candidate password against a minimum length and a list of
//! required character groups. Every violated rule is reported, so a form can
//! show the complete list at once.

use std::fmt;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Minimum password length (NIST SP 800-63B: SHALL be at least 8)
pub const DEFAULT_MIN_LENGTH: usize = 8;

/// Separator between groups in a required-chars configuration string
const GROUP_SEPARATOR: &str = "::";

// ============================================================================
// Required character groups
// ============================================================================

/// Ordered list of character groups; a password needs one char from each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredChars(Vec<String>);

impl RequiredChars {
    /// Parse `"abc::0123456789::!@#"` style configuration; empty groups are dropped.
    pub fn parse(source: &str) -> Self {
        Self(
            source
                .split(GROUP_SEPARATOR)
                .filter(|group| !group.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn groups(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Verification result
// ============================================================================

/// Machine-readable reason for rejecting a password
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    TooShort { min: usize, actual: usize },
    /// Groups with no character present in the password
    MissingRequiredChars { groups: Vec<String> },
}

impl Reason {
    pub fn code(&self) -> &'static str {
        match self {
            Reason::TooShort { .. } => "too_short",
            Reason::MissingRequiredChars { .. } => "missing_required_chars",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::TooShort { min, actual } => {
                write!(f, "password must be at least {min} characters (got {actual})")
            }
            Reason::MissingRequiredChars { groups } => write!(
                f,
                "password must contain at least one of each: {}",
                groups
                    .iter()
                    .map(|group| format!("[{group}]"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// One or more policy violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.message())]
pub struct PasswordVerificationError {
    reasons: Vec<Reason>,
}

impl PasswordVerificationError {
    pub fn reasons(&self) -> &[Reason] {
        &self.reasons
    }

    pub fn message(&self) -> String {
        self.reasons
            .iter()
            .map(Reason::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ============================================================================
// Policy
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub required_chars: RequiredChars,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            required_chars: RequiredChars::default(),
        }
    }
}

impl PasswordPolicy {
    pub fn with_required_chars(mut self, source: &str) -> Self {
        self.required_chars = RequiredChars::parse(source);
        self
    }

    /// Length is counted in Unicode scalar values after NFKC normalization,
    /// matching what the hasher sees.
    pub fn verify(&self, password: &str) -> Result<(), PasswordVerificationError> {
        let normalized: String = password.nfkc().collect();
        let mut reasons = Vec::new();

        let actual = normalized.chars().count();
        if actual < self.min_length {
            reasons.push(Reason::TooShort {
                min: self.min_length,
                actual,
            });
        }

        let missing: Vec<String> = self
            .required_chars
            .groups()
            .iter()
            .filter(|group| !normalized.chars().any(|c| group.contains(c)))
            .cloned()
            .collect();
        if !missing.is_empty() {
            reasons.push(Reason::MissingRequiredChars { groups: missing });
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(PasswordVerificationError { reasons })
        }
    }
}
