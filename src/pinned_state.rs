use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use users::os::unix::UserExt;
use users::{get_current_uid, get_user_by_name, get_user_by_uid};

/// Generations pinned against deletion
/// Pins act as a standing keep-list merged into every delete run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinnedState {
    pub pinned_generations: HashSet<u32>,
}

impl PinnedState {
    /// Load pinned state from the default config file
    /// Returns empty state if the file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path()?)
    }

    /// Load pinned state from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pin file: {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse pin file: {}", path.display()))
    }

    /// Save pinned state to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path()?)
    }

    /// Save pinned state to a specific path, atomically via rename
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize pinned state")?;

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write temp file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to save pin file: {}", path.display()))?;

        Ok(())
    }

    /// Pin a generation; returns false if it was already pinned
    pub fn pin(&mut self, number: u32) -> bool {
        self.pinned_generations.insert(number)
    }

    /// Unpin a generation; returns false if it was not pinned
    pub fn unpin(&mut self, number: u32) -> bool {
        self.pinned_generations.remove(&number)
    }

    /// Check if a generation is pinned
    pub fn is_pinned(&self, number: u32) -> bool {
        self.pinned_generations.contains(&number)
    }

    /// Pinned generation numbers in ascending order
    pub fn sorted(&self) -> Vec<u32> {
        let mut pins: Vec<u32> = self.pinned_generations.iter().copied().collect();
        pins.sort_unstable();
        pins
    }

    /// Default pin file path: $XDG_CONFIG_HOME/nixgen/pinned.json
    /// Under sudo the invoking user's home is used, not root's
    fn default_config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config)
        } else {
            let home = match std::env::var("SUDO_USER") {
                Ok(sudo_user) => match get_user_by_name(&sudo_user) {
                    Some(user) => user.home_dir().to_path_buf(),
                    None => Self::current_user_home()?,
                },
                Err(_) => Self::current_user_home()?,
            };
            home.join(".config")
        };

        Ok(config_dir.join("nixgen").join("pinned.json"))
    }

    fn current_user_home() -> Result<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            return Ok(PathBuf::from(home));
        }

        if let Some(user) = get_user_by_uid(get_current_uid()) {
            return Ok(user.home_dir().to_path_buf());
        }

        anyhow::bail!("Could not determine home directory")
    }
}
