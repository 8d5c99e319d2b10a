use crate::backend::GenerationBackend;
use crate::resolver::Generation;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, Utc};
use std::process::Command;

/// Real implementation of GenerationBackend that executes actual nix-env commands
pub struct NixBackend {
    profile_path: String,
}

impl NixBackend {
    /// Create a new NixBackend for the default system profile path
    pub fn new() -> Self {
        Self {
            profile_path: "/nix/var/nix/profiles/system".to_string(),
        }
    }

    /// Create a new NixBackend with a custom profile path (useful for testing)
    #[allow(dead_code)]
    pub fn with_profile(profile_path: String) -> Self {
        Self { profile_path }
    }
}

impl Default for NixBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one line of `nix-env --list-generations` output:
///   42   2024-01-15 10:30:45   (current)
/// The timestamp is in local time; it is converted to UTC so age cutoffs
/// compare correctly. Lines that do not look like a generation are skipped.
pub fn parse_generation_line(line: &str) -> Option<Generation> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut parts = line.split_whitespace();
    let number: u32 = parts.next()?.parse().ok()?;
    let date = parts.next()?;
    let time = parts.next()?;

    let naive = NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").ok()?;
    let creation_date = naive
        .and_local_timezone(Local)
        .single()?
        .with_timezone(&Utc);

    Some(Generation {
        number,
        creation_date,
        current: line.ends_with("(current)"),
        description: None,
    })
}

impl GenerationBackend for NixBackend {
    fn list_generations(&self) -> Result<Vec<Generation>> {
        // Execute: nix-env --list-generations -p /nix/var/nix/profiles/system
        let output = Command::new("nix-env")
            .arg("--list-generations")
            .arg("-p")
            .arg(&self.profile_path)
            .output()
            .context("Failed to execute nix-env --list-generations")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("nix-env --list-generations failed: {}", stderr);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_generation_line).collect())
    }

    fn delete_generations(&self, numbers: &[u32]) -> Result<()> {
        if numbers.is_empty() {
            return Ok(());
        }

        // Execute: nix-env --delete-generations 1 2 3 -p /nix/var/nix/profiles/system
        let output = Command::new("nix-env")
            .arg("--delete-generations")
            .args(numbers.iter().map(|n| n.to_string()))
            .arg("-p")
            .arg(&self.profile_path)
            .output()
            .context("Failed to execute nix-env --delete-generations")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("nix-env --delete-generations failed: {}", stderr);
        }

        Ok(())
    }
}
