//! Deezer ARL authentication token.
//!
//! The ARL is a long-lived session token that the external downloader uses
//! to authenticate against Deezer. It grants full account access, so it is
//! redacted from all debug output.

use std::{fmt, str::FromStr};

use veil::Redact;

use crate::error::{Error, Result};

/// A validated Deezer ARL token.
///
/// Construction goes through [`FromStr`] which enforces the expected
/// length, so holding an `Arl` means holding something shaped like a
/// real token (not that it is still valid server-side).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Redact)]
#[redact(all)]
pub struct Arl(String);

impl Arl {
    /// Number of characters in a Deezer ARL.
    const LENGTH: usize = 192;
}

impl FromStr for Arl {
    type Err = Error;

    /// Parses and validates an ARL string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the token has the wrong length or
    /// contains characters outside `[0-9a-f]`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        let chars = s.chars().count();
        if chars != Self::LENGTH {
            return Err(Error::invalid_argument(format!(
                "arl should be {} characters long but is {chars}",
                Self::LENGTH
            )));
        }

        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid_argument(
                "arl contains characters that are not hexadecimal",
            ));
        }

        Ok(Self(s.to_owned()))
    }
}

/// Displays the raw token, for handing to the external downloader.
impl fmt::Display for Arl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> String {
        "0123456789abcdef".repeat(12)
    }

    #[test]
    fn accepts_well_formed_token() {
        let arl = token().parse::<Arl>().expect("valid arl");
        assert_eq!(arl.to_string(), token());
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let padded = format!("  {}\n", token());
        assert!(padded.parse::<Arl>().is_ok());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("abc123".parse::<Arl>().is_err());
    }

    #[test]
    fn rejects_non_hex_characters() {
        let mut bad = token();
        bad.replace_range(0..1, "g");
        assert!(bad.parse::<Arl>().is_err());
    }

    #[test]
    fn debug_output_is_redacted() {
        let arl = token().parse::<Arl>().expect("valid arl");
        assert!(!format!("{arl:?}").contains("0123456789abcdef"));
    }
}
