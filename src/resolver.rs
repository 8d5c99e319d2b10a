use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use thiserror::Error;

/// A NixOS system generation as reported by the profile backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Unique generation number; increases with creation order, may have gaps
    pub number: u32,
    /// When the generation was created
    pub creation_date: DateTime<Utc>,
    /// Whether this is the currently active generation
    pub current: bool,
    /// Free-form label carried through unchanged
    pub description: Option<String>,
}

/// User-supplied retention/removal constraints for a delete run
/// All fields are optional; an empty bundle matches nothing
#[derive(Debug, Clone, Default)]
pub struct DeleteConstraints {
    /// Remove every generation except the current one
    pub all: bool,
    /// Inclusive lower bound on generation numbers to remove
    pub lower_bound: Option<u32>,
    /// Inclusive upper bound on generation numbers to remove
    pub upper_bound: Option<u32>,
    /// Remove generations created before now minus this duration
    pub older_than: Option<Duration>,
    /// Explicit generation numbers to remove
    pub remove: Vec<u32>,
    /// Explicit generation numbers to keep, overriding every other criterion
    pub keep: Vec<u32>,
    /// Floor on how many generations must survive the deletion
    pub minimum_to_keep: Option<usize>,
}

/// Why a deletion plan could not be produced
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no generations exist for this profile")]
    NoGenerationsExist,

    #[error("only one generation exists; the sole generation cannot be deleted")]
    OnlyOneGeneration,

    #[error("cannot keep {requested} generations when only {available} exist")]
    MinimumExceedsAvailable { requested: usize, available: usize },

    #[error("invalid range: lower bound {lower} is greater than upper bound {upper}")]
    InvalidBounds { lower: u32, upper: u32 },

    #[error("bound {bound} is outside the existing generation numbers")]
    BoundOutOfRange { bound: u32 },

    #[error("no generations matched the given constraints")]
    NoneResolved,
}

/// Resolve retention/removal constraints into a concrete deletion plan.
///
/// Pure function: no I/O, no mutation of the inputs. `now` is passed in so
/// age-based selection is deterministic under test. Returns the generations
/// to delete in ascending number order, or a typed error when resolution is
/// impossible or matched nothing. The current generation never appears in
/// the result.
///
/// Panics if the input list does not contain exactly one current generation;
/// that indicates a bug in the lister, not a user error.
pub fn resolve(
    generations: &[Generation],
    constraints: &DeleteConstraints,
    now: DateTime<Utc>,
) -> Result<Vec<Generation>, ResolveError> {
    if generations.is_empty() {
        return Err(ResolveError::NoGenerationsExist);
    }
    if generations.len() == 1 {
        return Err(ResolveError::OnlyOneGeneration);
    }
    if let Some(min_keep) = constraints.minimum_to_keep {
        if min_keep >= generations.len() {
            return Err(ResolveError::MinimumExceedsAvailable {
                requested: min_keep,
                available: generations.len(),
            });
        }
    }

    // The lister guarantees exactly one current generation; anything else
    // means its contract was violated and continuing could delete the
    // active system.
    let mut currents = generations.iter().filter(|g| g.current);
    let current = match (currents.next(), currents.next()) {
        (Some(g), None) => g.number,
        _ => panic!("generation list must contain exactly one current generation"),
    };

    let numbers: HashSet<u32> = generations.iter().map(|g| g.number).collect();

    // The current generation is never deletable, no matter what was asked
    let mut keep: HashSet<u32> = constraints.keep.iter().copied().collect();
    keep.insert(current);

    let mut remove: HashSet<u32> = constraints.remove.iter().copied().collect();
    // Numbers that do not exist cannot be deleted and must not skew the
    // retention arithmetic below
    remove.retain(|n| numbers.contains(n));

    if constraints.all {
        // --all overrides range and age selection entirely
        remove.extend(numbers.iter().copied());
    } else {
        if constraints.lower_bound.is_some() || constraints.upper_bound.is_some() {
            let (min, max) = generations
                .iter()
                .fold((u32::MAX, 0), |(lo, hi), g| (lo.min(g.number), hi.max(g.number)));
            let upper = constraints.upper_bound.unwrap_or(max);
            let lower = constraints.lower_bound.unwrap_or(min);

            if lower > upper {
                return Err(ResolveError::InvalidBounds { lower, upper });
            }
            if upper < min || upper > max {
                return Err(ResolveError::BoundOutOfRange { bound: upper });
            }
            if lower < min || lower > max {
                return Err(ResolveError::BoundOutOfRange { bound: lower });
            }

            remove.extend(numbers.iter().copied().filter(|n| (lower..=upper).contains(n)));
        }

        if let Some(age) = constraints.older_than {
            let cutoff = now - age;
            remove.extend(
                generations
                    .iter()
                    .filter(|g| g.creation_date < cutoff)
                    .map(|g| g.number),
            );
        }
    }

    // Explicit keeps win over every selection mechanism, --all included
    for n in &keep {
        remove.remove(n);
    }

    // Restore newest-first until the retention floor is met; the most
    // recent generations are the most useful rollback targets
    if let Some(min_keep) = constraints.minimum_to_keep {
        if min_keep > 0 && generations.len() - remove.len() < min_keep {
            let mut candidates: Vec<u32> = remove.iter().copied().collect();
            candidates.sort_unstable_by(|a, b| b.cmp(a));
            for n in candidates {
                if generations.len() - remove.len() >= min_keep {
                    break;
                }
                remove.remove(&n);
            }
        }
    }

    if remove.is_empty() {
        return Err(ResolveError::NoneResolved);
    }

    let mut plan: Vec<Generation> = generations
        .iter()
        .filter(|g| remove.contains(&g.number))
        .cloned()
        .collect();
    plan.sort_unstable_by_key(|g| g.number);

    Ok(plan)
}
