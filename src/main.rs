mod backend;
#[cfg(test)]
mod mock_backend;
mod nix_backend;
mod pinned_state;
mod resolver;

use anyhow::Result;
use backend::GenerationBackend;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use nix_backend::NixBackend;
use pinned_state::PinnedState;
use resolver::{DeleteConstraints, ResolveError, resolve};

#[derive(Parser)]
#[command(name = "nixgen")]
#[command(about = "Manage NixOS system generations with retention policies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all generations of the system profile
    List,
    /// Pin a generation so delete runs always keep it
    Pin {
        /// Generation number to pin
        generation: u32,
    },
    /// Remove the pin from a generation
    Unpin {
        /// Generation number to unpin
        generation: u32,
    },
    /// List all pinned generations
    Pins,
    /// Delete generations matching the given constraints
    Delete {
        /// Explicit generation numbers to delete
        generations: Vec<u32>,
        /// Delete every generation except the current one
        #[arg(long)]
        all: bool,
        /// Lowest generation number to delete (inclusive)
        #[arg(long)]
        from: Option<u32>,
        /// Highest generation number to delete (inclusive)
        #[arg(long)]
        to: Option<u32>,
        /// Keep at least this many generations
        #[arg(long)]
        min: Option<usize>,
        /// Delete generations older than this, e.g. 30d, 12h, 90m, 45s
        #[arg(long, value_parser = parse_duration)]
        older_than: Option<Duration>,
        /// Generation numbers to keep no matter what
        #[arg(long, value_delimiter = ',')]
        keep: Vec<u32>,
        /// Show what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let backend = NixBackend::new();

    match cli.command {
        Commands::List => run_list(&backend, &PinnedState::load()?),
        Commands::Pin { generation } => pin_generation(generation),
        Commands::Unpin { generation } => unpin_generation(generation),
        Commands::Pins => list_pins(),
        Commands::Delete {
            generations,
            all,
            from,
            to,
            min,
            older_than,
            keep,
            dry_run,
        } => {
            let constraints = DeleteConstraints {
                all,
                lower_bound: from,
                upper_bound: to,
                older_than,
                remove: generations,
                keep,
                minimum_to_keep: min,
            };
            run_delete(&backend, &PinnedState::load()?, constraints, dry_run)
        }
    }
}

/// Parse durations of the form 30d, 12h, 90m, 45s
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let err = || format!("invalid duration '{s}': expected a number followed by d, h, m, or s");

    if s.len() < 2 {
        return Err(err());
    }

    let (value, unit) = s.split_at(s.len() - 1);
    let value: u32 = value.parse().map_err(|_| err())?;
    let value = i64::from(value);

    match unit {
        "d" => Ok(Duration::days(value)),
        "h" => Ok(Duration::hours(value)),
        "m" => Ok(Duration::minutes(value)),
        "s" => Ok(Duration::seconds(value)),
        _ => Err(err()),
    }
}

fn run_list(backend: &dyn GenerationBackend, pins: &PinnedState) -> Result<()> {
    let generations = backend.list_generations()?;

    if generations.is_empty() {
        println!("No generations found");
        return Ok(());
    }

    for generation in &generations {
        let mut markers = Vec::new();
        if generation.current {
            markers.push("current");
        }
        if pins.is_pinned(generation.number) {
            markers.push("pinned");
        }

        let mut line = format!(
            "{:>4}   {}",
            generation.number,
            generation.creation_date.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(description) = &generation.description {
            line.push_str(&format!("   {description}"));
        }
        if !markers.is_empty() {
            line.push_str(&format!("   ({})", markers.join(", ")));
        }
        println!("{line}");
    }

    Ok(())
}

fn run_delete(
    backend: &dyn GenerationBackend,
    pins: &PinnedState,
    mut constraints: DeleteConstraints,
    dry_run: bool,
) -> Result<()> {
    // Pins behave as a standing keep-list
    constraints.keep.extend(pins.sorted());

    let generations = backend.list_generations()?;

    let plan = match resolve(&generations, &constraints, Utc::now()) {
        Ok(plan) => plan,
        Err(err @ ResolveError::MinimumExceedsAvailable { .. }) => {
            println!("{err}; keeping all generations");
            return Ok(());
        }
        Err(ResolveError::NoneResolved) => {
            println!("No generations matched the given constraints; nothing to do");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let numbers: Vec<u32> = plan.iter().map(|g| g.number).collect();

    if dry_run {
        println!(
            "[DRY RUN] Would delete {} generation(s): {:?}",
            numbers.len(),
            numbers
        );
        return Ok(());
    }

    println!("Deleting {} generation(s): {:?}", numbers.len(), numbers);
    backend.delete_generations(&numbers)?;
    println!("Successfully deleted {} generation(s)", numbers.len());

    Ok(())
}

fn pin_generation(generation: u32) -> Result<()> {
    let mut pins = PinnedState::load()?;

    if pins.pin(generation) {
        pins.save()?;
        println!("Pinned generation {generation}");
    } else {
        println!("Generation {generation} is already pinned");
    }

    Ok(())
}

fn unpin_generation(generation: u32) -> Result<()> {
    let mut pins = PinnedState::load()?;

    if pins.unpin(generation) {
        pins.save()?;
        println!("Unpinned generation {generation}");
    } else {
        println!("Generation {generation} was not pinned");
    }

    Ok(())
}

fn list_pins() -> Result<()> {
    let pins = PinnedState::load()?;

    if pins.pinned_generations.is_empty() {
        println!("No pinned generations");
    } else {
        println!("Pinned generations:");
        for number in pins.sorted() {
            println!("  {number}");
        }
    }

    Ok(())
}
