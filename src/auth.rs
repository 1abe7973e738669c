//! Stored-credential loading.
//!
//! The tool reuses the authorized-user file written by Google's OAuth
//! tooling (`token.json`). Only the access token is consumed here; obtaining
//! and refreshing it is out of scope.

use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// The slice of an authorized-user file this tool cares about.
///
/// Extra fields (refresh token, client id, scopes, ...) are ignored.
#[derive(Debug, Deserialize)]
pub struct StoredToken {
    token: SecretString,
}

impl StoredToken {
    /// Load the token file from disk.
    ///
    /// Fails with a configuration error when the file is missing or not the
    /// expected JSON shape; this happens before any batch work starts, so
    /// it aborts the run.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::TokenFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&raw).map_err(|e| ConfigError::TokenFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Consume the loaded file, yielding the bearer token.
    pub fn into_access_token(self) -> SecretString {
        self.token
    }
}
