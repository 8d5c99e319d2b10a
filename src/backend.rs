use crate::resolver::Generation;
use anyhow::Result;

/// Trait for abstracting the Nix profile commands
/// This allows for both real command execution and mocked behavior for testing
pub trait GenerationBackend {
    /// List all generations of the system profile, exactly one marked current
    fn list_generations(&self) -> Result<Vec<Generation>>;

    /// Delete the specified generations from the profile
    fn delete_generations(&self, numbers: &[u32]) -> Result<()>;
}
