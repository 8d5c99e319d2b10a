use crate::backend::GenerationBackend;
use crate::resolver::Generation;
use anyhow::Result;
use chrono::{Duration, Utc};
use std::cell::RefCell;
use std::collections::HashSet;

/// Mock implementation of GenerationBackend for testing
/// Simulates a Nix profile without executing real commands
pub struct MockBackend {
    generations: Vec<Generation>,
    deleted: RefCell<HashSet<u32>>,
    fail_on_delete: bool,
}

impl MockBackend {
    /// Create a mock holding the given generation numbers, one hour apart,
    /// with `current` marked as the active generation
    pub fn with_current(numbers: Vec<u32>, current: u32) -> Self {
        let now = Utc::now();
        let count = numbers.len() as i64;
        let generations = numbers
            .into_iter()
            .enumerate()
            .map(|(i, number)| Generation {
                number,
                creation_date: now - Duration::hours(count - i as i64),
                current: number == current,
                description: None,
            })
            .collect();
        Self {
            generations,
            deleted: RefCell::new(HashSet::new()),
            fail_on_delete: false,
        }
    }

    /// Configure the mock to fail when delete_generations is called
    pub fn fail_on_delete(mut self) -> Self {
        self.fail_on_delete = true;
        self
    }

    /// Check if a generation was deleted
    pub fn was_deleted(&self, number: u32) -> bool {
        self.deleted.borrow().contains(&number)
    }
}

impl GenerationBackend for MockBackend {
    fn list_generations(&self) -> Result<Vec<Generation>> {
        let deleted = self.deleted.borrow();
        Ok(self
            .generations
            .iter()
            .filter(|g| !deleted.contains(&g.number))
            .cloned()
            .collect())
    }

    fn delete_generations(&self, numbers: &[u32]) -> Result<()> {
        if self.fail_on_delete {
            anyhow::bail!("Simulated deletion failure");
        }

        // The resolver must never let the current generation through
        if let Some(current) = self.generations.iter().find(|g| g.current) {
            if numbers.contains(&current.number) {
                anyhow::bail!("Cannot delete current generation: {}", current.number);
            }
        }

        let mut deleted = self.deleted.borrow_mut();
        for &number in numbers {
            deleted.insert(number);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_undeleted_generations() {
        let backend = MockBackend::with_current(vec![1, 2, 3, 5, 7], 7);
        let generations = backend.list_generations().unwrap();
        assert_eq!(generations.len(), 5);
        assert_eq!(generations[0].number, 1);
        assert!(generations[4].current);
    }

    #[test]
    fn records_deletions() {
        let backend = MockBackend::with_current(vec![1, 2, 3, 4, 5], 5);
        backend.delete_generations(&[1, 3]).unwrap();

        assert!(backend.was_deleted(1));
        assert!(!backend.was_deleted(2));
        assert!(backend.was_deleted(3));

        let remaining = backend.list_generations().unwrap();
        assert_eq!(remaining.len(), 3);
    }

    #[test]
    fn refuses_to_delete_current() {
        let backend = MockBackend::with_current(vec![1, 2, 3], 3);
        let result = backend.delete_generations(&[3]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Cannot delete current generation"));
    }

    #[test]
    fn simulated_failure() {
        let backend = MockBackend::with_current(vec![1, 2, 3], 3).fail_on_delete();
        assert!(backend.delete_generations(&[1]).is_err());
    }

    #[test]
    fn timestamps_follow_creation_order() {
        let backend = MockBackend::with_current(vec![1, 2, 3], 3);
        let generations = backend.list_generations().unwrap();
        assert!(generations[0].creation_date < generations[2].creation_date);
    }
}
