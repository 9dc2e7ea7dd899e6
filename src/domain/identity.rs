use serde::Serialize;
use std::fmt;

use super::LedgerError;

/// Opaque key identifying a participant.
///
/// Values are only produced by an [`IdentityValidator`], so holding an
/// `Identity` means the raw input already passed the boundary check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse with the default [`HexAddressValidator`].
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        HexAddressValidator.validate(raw)
    }

    /// Shortened form for tables, e.g. "0x1a2b3c…".
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decides what counts as a well-formed identity.
pub trait IdentityValidator: Send + Sync {
    /// Return the canonical key for `raw`, or `None` if it is malformed.
    fn normalize(&self, raw: &str) -> Option<String>;

    fn validate(&self, raw: &str) -> Result<Identity, LedgerError> {
        self.normalize(raw)
            .map(Identity)
            .ok_or_else(|| LedgerError::InvalidIdentity(raw.to_string()))
    }
}

/// Default rule: `0x` followed by 40 hex digits, case-insensitive.
/// Canonical form is lower case.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexAddressValidator;

impl HexAddressValidator {
    pub const HEX_DIGITS: usize = 40;
}

impl IdentityValidator for HexAddressValidator {
    fn normalize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        let hex = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))?;
        if hex.len() != Self::HEX_DIGITS || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(format!("0x{}", hex.to_ascii_lowercase()))
    }
}

/// Accepts any non-blank key verbatim (after trimming).
/// Useful for deployments whose identities are not addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonBlankValidator;

impl IdentityValidator for NonBlankValidator {
    fn normalize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        (!raw.is_empty()).then(|| raw.to_string())
    }
}
