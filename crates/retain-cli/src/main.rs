//! Retain CLI
//!
//! Command-line client for reviewing cards and managing leeches.

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use retain_core::{
    Card, CardStore, EngineConfig, FixLeech, LearningState, NewCard, Rating, ReviewOrchestrator,
    Storage, DEFAULT_BATCH_SIZE,
};

/// Retain - Spaced Repetition CLI
#[derive(Parser)]
#[command(name = "retain")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Review flashcards scheduled by FSRS v4")]
#[command(long_about = "Retain schedules vocabulary cards with the FSRS v4 memory model.\n\nCards that keep failing are flagged as leeches and pulled from the queue until fixed.")]
struct Cli {
    /// Directory holding retain.db (defaults to the platform data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a card to the learning pool
    Add {
        /// Word, phrase or question to learn
        content: String,
        /// Memory aid shown with the card
        #[arg(long)]
        mnemonic: Option<String>,
        /// Example sentence (repeatable)
        #[arg(long = "example")]
        examples: Vec<String>,
    },

    /// List the cards a review session would show now
    Due {
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show the interval each rating would give a card
    Preview {
        id: String,
        /// Print the full scheduling outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a review (1=Again, 2=Hard, 3=Good, 4=Easy)
    Review {
        id: String,
        #[arg(allow_hyphen_values = true)]
        rating: i32,
    },

    /// List flagged leeches, most lapses first
    Leeches,

    /// Reset a leech, optionally with better content
    FixLeech {
        id: String,
        #[arg(long)]
        mnemonic: Option<String>,
        /// Replacement example sentence (repeatable; replaces all examples)
        #[arg(long = "example")]
        examples: Vec<String>,
    },

    /// Keep a card out of the queue permanently
    Suspend { id: String },

    /// Return a suspended card to the queue
    Unsuspend { id: String },

    /// Show the review history of a card
    History {
        id: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show pool statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// RUST_LOG directives when set and valid, otherwise warnings only
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let storage = open_storage(cli.data_dir)?;

    match cli.command {
        Commands::Add {
            content,
            mnemonic,
            examples,
        } => run_add(&storage, content, mnemonic, examples),
        Commands::Due { limit, offset } => run_due(&storage, limit, offset),
        Commands::Preview { id, json } => run_preview(&storage, &id, json),
        Commands::Review { id, rating } => run_review(&storage, &id, rating),
        Commands::Leeches => run_leeches(&storage),
        Commands::FixLeech {
            id,
            mnemonic,
            examples,
        } => run_fix_leech(&storage, &id, mnemonic, examples),
        Commands::Suspend { id } => run_suspend(&storage, &id),
        Commands::Unsuspend { id } => run_unsuspend(&storage, &id),
        Commands::History { id, limit } => run_history(&storage, &id, limit),
        Commands::Stats { json } => run_stats(&storage, json),
    }
}

fn open_storage(data_dir: Option<PathBuf>) -> anyhow::Result<Storage> {
    let db_path = match data_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            Some(dir.join("retain.db"))
        }
        None => None,
    };
    Ok(Storage::new(db_path)?)
}

fn engine(storage: &Storage) -> anyhow::Result<ReviewOrchestrator<&Storage>> {
    let config = EngineConfig::from_env()?;
    Ok(ReviewOrchestrator::new(storage, &config))
}

fn run_add(
    storage: &Storage,
    content: String,
    mnemonic: Option<String>,
    examples: Vec<String>,
) -> anyhow::Result<()> {
    let card = storage.add_card(NewCard {
        content,
        mnemonic,
        examples,
    })?;

    println!("{} {}", "Added".green().bold(), card.content);
    println!("{}: {}", "ID".white().bold(), card.id);
    Ok(())
}

fn run_due(storage: &Storage, limit: usize, offset: usize) -> anyhow::Result<()> {
    let now = Utc::now();
    let cards = storage.fetch_due_and_new(now, limit, offset)?;
    let total = storage.count_due(now)?;

    println!("{}", "=== Review Queue ===".cyan().bold());
    println!();

    if cards.is_empty() {
        println!("{}", "Nothing to review.".dimmed());
        return Ok(());
    }

    for card in &cards {
        println!("  {} {:12} {}", card.id.dimmed(), state_label(card), card.content);
    }

    println!();
    println!(
        "{}: {}-{} of {}",
        "Showing".white().bold(),
        offset + 1,
        offset + cards.len(),
        total
    );
    Ok(())
}

fn run_preview(storage: &Storage, id: &str, json: bool) -> anyhow::Result<()> {
    let engine = engine(storage)?;
    let now = Utc::now();
    let preview = engine.preview(id, now)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!("{}", "=== Preview ===".cyan().bold());
    for (rating, info) in preview.iter() {
        println!(
            "  {:6} {:>6}  {} {}",
            rating.to_string().white().bold(),
            format_interval(info.state.scheduled_days),
            "->".dimmed(),
            info.state.state
        );
    }
    Ok(())
}

fn run_review(storage: &Storage, id: &str, rating: i32) -> anyhow::Result<()> {
    let engine = engine(storage)?;
    let outcome = engine.process_result(id, rating, Utc::now())?;
    let card = &outcome.card;

    println!(
        "{} {} as {}",
        "Reviewed".green().bold(),
        card.content,
        outcome.log.rating
    );
    println!(
        "{}: {} ({})",
        "Next review".white().bold(),
        format_interval(card.fsrs.scheduled_days),
        format_due(card.fsrs.due)
    );
    println!("{}: {}", "State".white().bold(), card.fsrs.state);

    if outcome.became_leech {
        println!();
        println!(
            "{} this card has lapsed {} times in {} reviews and was suspended.",
            "Leech:".red().bold(),
            card.fsrs.lapses,
            card.fsrs.reps
        );
        println!("  Fix it with `retain fix-leech {}`", card.id);
    }
    Ok(())
}

fn run_leeches(storage: &Storage) -> anyhow::Result<()> {
    let leeches = storage.list_leeches()?;

    println!("{}", "=== Leeches ===".yellow().bold());
    println!();

    if leeches.is_empty() {
        println!("{}", "No leeches.".dimmed());
        return Ok(());
    }

    for card in &leeches {
        println!(
            "  {} {:>3} lapses / {:>3} reviews  {}",
            card.id.dimmed(),
            card.fsrs.lapses,
            card.fsrs.reps,
            card.content
        );
    }
    Ok(())
}

fn run_fix_leech(
    storage: &Storage,
    id: &str,
    mnemonic: Option<String>,
    examples: Vec<String>,
) -> anyhow::Result<()> {
    let fix = FixLeech {
        mnemonic,
        examples: if examples.is_empty() { None } else { Some(examples) },
    };
    let card = engine(storage)?.fix_leech(id, fix)?;

    println!("{} {}", "Fixed".green().bold(), card.content);
    if let Some(mnemonic) = &card.mnemonic {
        println!("{}: {}", "Mnemonic".white().bold(), mnemonic);
    }
    Ok(())
}

fn run_suspend(storage: &Storage, id: &str) -> anyhow::Result<()> {
    let card = engine(storage)?.suspend_forever(id)?;
    println!("{} {}", "Suspended".yellow().bold(), card.content);
    Ok(())
}

fn run_unsuspend(storage: &Storage, id: &str) -> anyhow::Result<()> {
    let card = engine(storage)?.unsuspend(id)?;
    println!("{} {}", "Unsuspended".green().bold(), card.content);
    Ok(())
}

fn run_history(storage: &Storage, id: &str, limit: usize) -> anyhow::Result<()> {
    let card = storage
        .get_card(id)?
        .ok_or_else(|| anyhow::anyhow!("Card not found: {}", id))?;
    let logs = storage.get_review_logs(id, limit)?;

    println!("{} {}", "=== History:".cyan().bold(), card.content.cyan().bold());
    println!();

    if logs.is_empty() {
        println!("{}", "Never reviewed.".dimmed());
        return Ok(());
    }

    for record in &logs {
        let log = &record.log;
        let rating = match log.rating {
            Rating::Again => log.rating.to_string().red(),
            Rating::Hard => log.rating.to_string().yellow(),
            Rating::Good => log.rating.to_string().green(),
            Rating::Easy => log.rating.to_string().cyan(),
        };
        println!(
            "  {}  {:6} from {:10} elapsed {:>5}  next {:>5}",
            log.review.format("%Y-%m-%d %H:%M"),
            rating,
            log.state.as_str(),
            format_interval(log.elapsed_days),
            format_interval(log.scheduled_days)
        );
    }
    Ok(())
}

fn run_stats(storage: &Storage, json: bool) -> anyhow::Result<()> {
    let stats = storage.get_stats(Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "=== Retain Statistics ===".cyan().bold());
    println!();
    println!("{}: {}", "Total Cards".white().bold(), stats.total_cards);
    println!("{}: {}", "Due for Review".white().bold(), stats.due_cards);
    println!("{}: {}", "New".white().bold(), stats.new_cards);
    println!("{}: {}", "Learned".white().bold(), stats.learned_cards());
    println!("  {}: {}", "Learning".white(), stats.learning_cards);
    println!("  {}: {}", "Review".white(), stats.review_cards);
    println!("  {}: {}", "Relearning".white(), stats.relearning_cards);
    println!("{}: {}", "Leeches".white().bold(), stats.leech_cards);
    println!("{}: {}", "Suspended".white().bold(), stats.suspended_cards);
    println!("{}: {}", "Total Reviews".white().bold(), stats.total_reviews);
    Ok(())
}

fn state_label(card: &Card) -> colored::ColoredString {
    let label = card.fsrs.state.as_str();
    match card.fsrs.state {
        LearningState::New => label.blue(),
        LearningState::Learning | LearningState::Relearning => label.yellow(),
        LearningState::Review => label.green(),
    }
}

fn format_due(due: DateTime<Utc>) -> String {
    due.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Compact interval label: now, 3d, 2w, 4mo, 1y
fn format_interval(days: i32) -> String {
    if days <= 0 {
        "now".to_string()
    } else if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}
