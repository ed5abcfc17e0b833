//! Unified path management for duet storage.
//!
//! Resolves the default on-disk location of the TOML profile store so all
//! deployments agree on a layout.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.local/share/duet/         # Data directory
//! ├── profiles/                # TomlProfileStore root
//! │   ├── <user_id>.toml       # One file per profile
//! │   ├── interactions.toml    # Append-only rating ledger
//! │   └── store.lock           # fs2 lock file for multi-row writes
//! ```

use duet_core::error::{DuetError, Result};
use std::path::PathBuf;

/// Unified path resolution for duet.
pub struct DuetPaths;

impl DuetPaths {
    /// The duet data directory (`~/.local/share/duet` on Linux).
    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|d| d.join("duet"))
            .ok_or_else(|| DuetError::config("cannot determine the user data directory"))
    }

    /// Default root for the TOML profile store.
    pub fn profiles_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("profiles"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_dir_nests_under_data_dir() {
        let data = DuetPaths::data_dir().unwrap();
        let profiles = DuetPaths::profiles_dir().unwrap();
        assert!(profiles.starts_with(&data));
        assert!(profiles.ends_with("duet/profiles"));
    }
}
