//! Password generation and validation.
//!
//! The same [`PasswordPolicy`] produces capability passwords for uploads,
//! initial user passwords, and checks passwords chosen by users. Generation
//! guarantees its output passes [`PasswordPolicy::validate`].

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::random::{uniform_index, RandomSource};

const DIGITS: &str = "0123456789";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Special characters that survive URL query strings without escaping.
pub const DEFAULT_SPECIAL_CHARACTERS: &str = "-_.~!*";

/// A generated or supplied password handed back to the caller exactly once.
///
/// Zeroised on drop and redacted in `Debug` output. The engine never persists
/// it; only the envelope it produced is stored.
#[derive(Clone, PartialEq, Eq)]
pub struct CapabilityPassword(Zeroizing<String>);

impl CapabilityPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    /// Borrow the secret, e.g. to embed it in a download link.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl From<Zeroizing<String>> for CapabilityPassword {
    fn from(password: Zeroizing<String>) -> Self {
        Self(password)
    }
}

impl fmt::Debug for CapabilityPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CapabilityPassword(<redacted>)")
    }
}

/// A single reason a password fails the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyViolation {
    TooShort { minimum: usize, actual: usize },
    TooLong { maximum: usize, actual: usize },
    MissingDigit,
    MissingLowercase,
    MissingUppercase,
    MissingSpecial,
    ContainsWhitespace,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { minimum, actual } => write!(
                f,
                "password must be at least {minimum} characters long (got {actual})"
            ),
            Self::TooLong { maximum, actual } => write!(
                f,
                "password must be at most {maximum} characters long (got {actual})"
            ),
            Self::MissingDigit => write!(f, "password must contain a digit"),
            Self::MissingLowercase => write!(f, "password must contain a lowercase letter"),
            Self::MissingUppercase => write!(f, "password must contain an uppercase letter"),
            Self::MissingSpecial => write!(f, "password must contain a special character"),
            Self::ContainsWhitespace => write!(f, "password must not contain whitespace"),
        }
    }
}

/// Character-class and length rules for passwords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub minimum_length: usize,
    pub maximum_length: Option<usize>,
    /// Length of generated passwords, raised to `minimum_length` if smaller.
    pub generated_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_special: bool,
    pub special_characters: String,
    pub allow_whitespace: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            minimum_length: 12,
            maximum_length: Some(128),
            generated_length: 32,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_special: true,
            special_characters: DEFAULT_SPECIAL_CHARACTERS.to_string(),
            allow_whitespace: false,
        }
    }
}

impl PasswordPolicy {
    /// Check that the policy is internally consistent.
    pub fn check(&self) -> Result<()> {
        if self.minimum_length == 0 {
            return Err(VaultError::Configuration(
                "minimum_length must be greater than zero".into(),
            ));
        }
        if let Some(max) = self.maximum_length {
            if max < self.minimum_length {
                return Err(VaultError::Configuration(format!(
                    "maximum_length {max} is below minimum_length {}",
                    self.minimum_length
                )));
            }
            if max < self.enabled_classes().len() {
                return Err(VaultError::Configuration(format!(
                    "maximum_length {max} cannot fit every required character class"
                )));
            }
        }
        if self.require_special && self.special_characters.is_empty() {
            return Err(VaultError::Configuration(
                "require_special is set but no special characters are configured".into(),
            ));
        }
        if self.special_characters.chars().any(char::is_whitespace) && !self.allow_whitespace {
            return Err(VaultError::Configuration(
                "special characters contain whitespace the policy forbids".into(),
            ));
        }
        Ok(())
    }

    /// Every violation of this policy by `password`, empty if compliant.
    ///
    /// Length is counted in characters, not bytes. Never fails.
    pub fn validate(&self, password: &str) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();
        let length = password.chars().count();

        if length < self.minimum_length {
            violations.push(PolicyViolation::TooShort {
                minimum: self.minimum_length,
                actual: length,
            });
        }
        if let Some(maximum) = self.maximum_length {
            if length > maximum {
                violations.push(PolicyViolation::TooLong {
                    maximum,
                    actual: length,
                });
            }
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PolicyViolation::MissingDigit);
        }
        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            violations.push(PolicyViolation::MissingLowercase);
        }
        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            violations.push(PolicyViolation::MissingUppercase);
        }
        if self.require_special && !password.chars().any(|c| self.special_characters.contains(c))
        {
            violations.push(PolicyViolation::MissingSpecial);
        }
        if !self.allow_whitespace && password.chars().any(char::is_whitespace) {
            violations.push(PolicyViolation::ContainsWhitespace);
        }

        violations
    }

    /// Like [`validate`](Self::validate), but as a `Result` for orchestration.
    pub fn ensure_compliant(&self, password: &str) -> Result<()> {
        let violations = self.validate(password);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(VaultError::PolicyViolation(violations))
        }
    }

    /// Generate a random password satisfying every enabled rule.
    ///
    /// One character from each required class is placed first, the rest are
    /// drawn from the union of enabled classes, then the whole buffer is
    /// shuffled so class positions are unpredictable.
    pub fn generate(&self, rng: &dyn RandomSource) -> Result<Zeroizing<String>> {
        self.check()?;

        let classes = self.enabled_classes();
        let mut alphabet: Vec<char> = classes.iter().flat_map(|c| c.iter().copied()).collect();
        if alphabet.is_empty() {
            alphabet = [DIGITS, LOWERCASE, UPPERCASE]
                .iter()
                .flat_map(|s| s.chars())
                .chain(self.special_characters.chars())
                .filter(|c| self.allow_whitespace || !c.is_whitespace())
                .collect();
        }

        let length = self.generated_length_for(classes.len());
        let mut chars: Zeroizing<Vec<char>> = Zeroizing::new(Vec::with_capacity(length));

        for class in &classes {
            chars.push(class[uniform_index(rng, class.len())?]);
        }
        while chars.len() < length {
            chars.push(alphabet[uniform_index(rng, alphabet.len())?]);
        }

        // Fisher-Yates.
        for i in (1..chars.len()).rev() {
            let j = uniform_index(rng, i + 1)?;
            chars.swap(i, j);
        }

        Ok(Zeroizing::new(chars.iter().collect()))
    }

    fn generated_length_for(&self, class_count: usize) -> usize {
        let wanted = self
            .generated_length
            .max(self.minimum_length)
            .max(class_count);
        match self.maximum_length {
            Some(max) if max >= self.minimum_length.max(class_count) => wanted.min(max),
            _ => wanted,
        }
    }

    fn enabled_classes(&self) -> Vec<Vec<char>> {
        let mut classes = Vec::with_capacity(4);
        if self.require_digit {
            classes.push(DIGITS.chars().collect());
        }
        if self.require_lowercase {
            classes.push(LOWERCASE.chars().collect());
        }
        if self.require_uppercase {
            classes.push(UPPERCASE.chars().collect());
        }
        if self.require_special {
            classes.push(self.special_characters.chars().collect());
        }
        classes
    }
}
