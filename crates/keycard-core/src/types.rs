use crate::{Result, constants::MAX_IDENTIFIER_LENGTH, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Canonical card identifier (uppercase hexadecimal tag UID).
///
/// Textual input is normalized by dropping every whitespace character and
/// uppercasing, so `"aa bb cc dd"` and `"AABBCCDD"` are the same identifier.
///
/// # Security
/// Comparison is constant-time so lookups do not leak how many leading
/// characters of a presented card match a stored one.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Parse and canonicalize a textual identifier.
    ///
    /// # Errors
    /// Returns `Error::InvalidIdentifier` if nothing is left after removing
    /// whitespace or if a non-alphanumeric character is present, and
    /// `Error::IdentifierTooLong` past [`MAX_IDENTIFIER_LENGTH`].
    pub fn parse(text: &str) -> Result<Self> {
        let canonical: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if canonical.is_empty() {
            return Err(Error::InvalidIdentifier("empty identifier".to_string()));
        }

        if !canonical.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidIdentifier(format!(
                "identifier must be alphanumeric ASCII, got {text:?}"
            )));
        }

        let len = canonical.len();
        if len > MAX_IDENTIFIER_LENGTH {
            return Err(Error::IdentifierTooLong {
                len,
                max: MAX_IDENTIFIER_LENGTH,
            });
        }

        Ok(Identifier(canonical))
    }

    /// Build an identifier from raw tag UID bytes.
    ///
    /// # Errors
    /// Returns an error for an empty UID or one longer than 10 bytes.
    ///
    /// ```
    /// use keycard_core::Identifier;
    ///
    /// let id = Identifier::from_bytes(&[0xaa, 0xbb, 0xcc, 0xdd]).unwrap();
    /// assert_eq!(id.as_str(), "AABBCCDD");
    /// ```
    pub fn from_bytes(uid: &[u8]) -> Result<Self> {
        let hex: String = uid.iter().map(|b| format!("{b:02X}")).collect();
        Self::parse(&hex)
    }

    /// Get the canonical form as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Identifier::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Identifier::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for Identifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Role a presented card resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The enrolled master card.
    Master,
    /// A card granted through learning mode.
    Authorized,
    /// Anything else.
    Unknown,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Master => write!(f, "Master"),
            Role::Authorized => write!(f, "Authorized"),
            Role::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Operating mode of the authentication state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No master stored yet; only valid before startup completes.
    NoMasterEnrolled,
    /// Authenticating cards against the allow-list.
    Normal,
    /// Waiting for the card that becomes master.
    MasterLearning,
    /// Adding presented cards to the allow-list until the master returns.
    CardLearning,
}

impl Mode {
    /// Check if a transition to `target` is allowed from this mode.
    ///
    /// ```
    /// use keycard_core::Mode;
    ///
    /// assert!(Mode::NoMasterEnrolled.can_transition_to(Mode::MasterLearning));
    /// assert!(Mode::Normal.can_transition_to(Mode::CardLearning));
    /// assert!(!Mode::MasterLearning.can_transition_to(Mode::CardLearning));
    /// ```
    #[must_use]
    pub fn can_transition_to(self, target: Mode) -> bool {
        matches!(
            (self, target),
            (Mode::NoMasterEnrolled, Mode::MasterLearning | Mode::Normal)
                | (Mode::MasterLearning, Mode::Normal)
                | (Mode::Normal, Mode::CardLearning)
                | (Mode::CardLearning, Mode::Normal)
        )
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::NoMasterEnrolled => write!(f, "NoMasterEnrolled"),
            Mode::Normal => write!(f, "Normal"),
            Mode::MasterLearning => write!(f, "MasterLearning"),
            Mode::CardLearning => write!(f, "CardLearning"),
        }
    }
}
