//! Pulse Control - CLI for the TrendPulse validation engine.
//!
//! Drives the engine operations directly against the store: submit
//! trends, cast votes, force-resolve, and inspect XP summaries and the
//! intake queue.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pulse_common::DEFAULT_DB_PATH;

#[derive(Parser)]
#[command(name = "pulsectl")]
#[command(about = "TrendPulse - trend validation and reward engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine database path
    #[arg(long, default_value = DEFAULT_DB_PATH, global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a trend observation
    Submit {
        /// Submitting user id
        #[arg(long)]
        user: String,

        /// Trend category (political, finance, fashion, meme, gaming,
        /// lifestyle, health, music, brand, social_cause, other)
        #[arg(long)]
        category: String,

        /// Source platform (tiktok, instagram, twitter, youtube, reddit,
        /// linkedin, unknown)
        #[arg(long)]
        platform: String,

        /// Quality score in [0, 1]
        #[arg(long, default_value_t = 0.5)]
        quality: f64,
    },

    /// Cast a validation vote on a trend
    Vote {
        /// Trend id
        #[arg(long)]
        trend: String,

        /// Voting user id
        #[arg(long)]
        user: String,

        /// Vote value: yes, no, or unsure
        #[arg(long)]
        vote: String,
    },

    /// Force-resolve a trend past its voting window
    Resolve {
        /// Trend id
        #[arg(long)]
        trend: String,
    },

    /// Show a trend's status and tally
    Show {
        /// Trend id
        #[arg(long)]
        trend: String,
    },

    /// Show a user's XP summary
    Summary {
        /// User id
        #[arg(long)]
        user: String,
    },

    /// Show queued/dead intake outbox entries
    Queue,

    /// Run one reconciler pass and one expiry sweep
    Sweep,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            user,
            category,
            platform,
            quality,
        } => commands::submit(&cli.db, &user, &category, &platform, quality),
        Commands::Vote { trend, user, vote } => commands::vote(&cli.db, &trend, &user, &vote),
        Commands::Resolve { trend } => commands::resolve(&cli.db, &trend),
        Commands::Show { trend } => commands::show(&cli.db, &trend),
        Commands::Summary { user } => commands::summary(&cli.db, &user),
        Commands::Queue => commands::queue(&cli.db),
        Commands::Sweep => commands::sweep(&cli.db),
    }
}
