//! The long-lived Deezer authentication cookie.
//!
//! An ARL is what a browser stores in the `arl` cookie after logging in to
//! Deezer. It is valid for months and is exchanged for short-lived JWTs by
//! the [`TokenManager`](crate::auth::TokenManager). It grants full access
//! to the account, so it is never included in `Debug` output or logs.
//!
//! # Loading
//!
//! ```rust
//! use deezer_pipe::arl::Arl;
//!
//! // From a secrets file containing `arl = "..."`
//! let arl = Arl::from_file("secrets.toml")?;
//!
//! // From the `DEEZER_ARL` environment variable
//! let arl = Arl::from_env()?;
//!
//! // Or directly
//! let arl: Arl = "cookie-abc".parse()?;
//! ```

use std::{fs, path::Path, str::FromStr};

use veil::Redact;

use crate::error::{Error, Result};

/// Long-lived credential used to bootstrap authentication.
#[derive(Clone, PartialEq, Eq, Hash, Redact)]
#[redact(all)]
pub struct Arl(String);

impl Arl {
    /// Environment variable read by [`Arl::from_env`].
    pub const ENV_VAR: &'static str = "DEEZER_ARL";

    /// Placeholder value shipped in example secrets files.
    const PLACEHOLDER: &'static str = "your_arl_here";

    /// Secrets files are tiny; anything larger is not what we expect.
    const MAX_FILE_SIZE: u64 = 1024;

    /// Loads the ARL from a TOML secrets file with an `arl` key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, is larger than
    /// 1 KiB, is not valid TOML, has no `arl` string or the value is not a
    /// valid ARL.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition: secrets file should be small.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::config(format!("{} is too large", path.display())));
        }

        let contents = fs::read_to_string(path)?;
        let value = contents.parse::<toml::Table>()?;

        match value.get("arl").and_then(toml::Value::as_str) {
            Some(arl) => arl.parse(),
            None => Err(Error::config(format!(
                "{} does not contain an arl",
                path.display()
            ))),
        }
    }

    /// Reads the ARL from the `DEEZER_ARL` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the variable is unset, not unicode or
    /// not a valid ARL.
    pub fn from_env() -> Result<Self> {
        let value = std::env::var(Self::ENV_VAR)
            .map_err(|e| Error::config(format!("{}: {e}", Self::ENV_VAR)))?;
        value.parse()
    }

    /// The raw cookie value.
    ///
    /// Only to be used when building the token exchange request.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Arl {
    type Err = Error;

    /// Parses an ARL, trimming surrounding whitespace and quotes.
    ///
    /// The value must be usable as a cookie value: no whitespace, control
    /// characters, `;`, `,`, `"` or `\`.
    fn from_str(s: &str) -> Result<Self> {
        let arl = s.trim().trim_matches(|chr: char| chr == '"' || chr == '\'');

        if arl.is_empty() {
            return Err(Error::config("arl is empty"));
        }

        if arl == Self::PLACEHOLDER {
            return Err(Error::config("arl is still set to the placeholder value"));
        }

        let illegal_chars =
            |chr: char| chr.is_whitespace() || chr.is_control() || matches!(chr, ';' | ',' | '"' | '\\');
        if arl.contains(illegal_chars) {
            return Err(Error::config("arl contains characters not allowed in a cookie"));
        }

        Ok(Self(arl.to_owned()))
    }
}
