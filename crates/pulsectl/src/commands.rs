//! Command handlers for pulsectl.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

use pulse_common::config::EngineConfig;
use pulse_common::taxonomy::{Category, Platform};
use pulse_common::trend::{SubmitPayload, TrendStatus, VoteValue};
use pulsed::TrendEngine;

fn open_engine(db: &Path) -> Result<TrendEngine> {
    let engine = TrendEngine::open(db, EngineConfig::default())
        .with_context(|| format!("opening engine store at {}", db.display()))?;
    Ok(engine)
}

fn print_kv(key: &str, value: &str) {
    println!("{:>16}  {}", key.dimmed(), value);
}

pub fn submit(db: &Path, user: &str, category: &str, platform: &str, quality: f64) -> Result<()> {
    let payload = SubmitPayload::new(
        Category::parse(category)?,
        Platform::parse(platform)?,
        quality,
    );
    let engine = open_engine(db)?;
    let outcome = engine.submit_trend(user, payload)?;

    println!();
    println!("{}", "trend submitted".green().bold());
    print_kv("trend", &outcome.trend_id);
    print_kv("status", outcome.status.as_str());
    if outcome.queued {
        print_kv("intake", &"queued for reconciler".yellow().to_string());
    }
    if let Some(reward) = &outcome.reward {
        print_kv("xp", &format!("{:+}", reward.delta));
        if reward.capped {
            print_kv("capped", &"daily cap reached".yellow().to_string());
        }
        for line in &reward.breakdown {
            print_kv("", line);
        }
    }
    if let Some(change) = &outcome.level_change {
        println!(
            "{}",
            format!("level up! {} -> {} ({})", change.from, change.to, change.title)
                .cyan()
                .bold()
        );
    }
    println!();
    Ok(())
}

pub fn vote(db: &Path, trend: &str, user: &str, vote: &str) -> Result<()> {
    let value = VoteValue::parse(vote)?;
    let engine = open_engine(db)?;
    let outcome = engine.cast_vote(trend, user, value)?;

    println!();
    if outcome.accepted {
        println!("{}", "vote recorded".green().bold());
    } else {
        println!("{}", "vote not accepted (trend already resolved)".yellow());
    }
    print_kv("status", outcome.status_after.as_str());
    if let Some(reward) = &outcome.reward {
        print_kv("xp", &format!("{:+}", reward.delta));
    }
    if let Some(resolution) = &outcome.resolution {
        print_resolution(resolution);
    }
    println!();
    Ok(())
}

pub fn resolve(db: &Path, trend: &str) -> Result<()> {
    let engine = open_engine(db)?;
    match engine.resolve_or_expire(trend)? {
        Some(resolution) => {
            println!();
            print_resolution(&resolution);
            println!();
        }
        None => println!("nothing to do (trend resolved or still inside the voting window)"),
    }
    Ok(())
}

fn print_resolution(resolution: &pulsed::ballot::Resolution) {
    let status = match resolution.status {
        TrendStatus::Validated => "VALIDATED".green().bold().to_string(),
        TrendStatus::Rejected => "REJECTED".red().bold().to_string(),
        TrendStatus::Pending => "PENDING".to_string(),
    };
    println!("consensus reached: {}", status);
    print_kv(
        "tally",
        &format!(
            "{} yes / {} no / {} unsure",
            resolution.tally.yes, resolution.tally.no, resolution.tally.unsure
        ),
    );
    print_kv("submitter xp", &format!("{:+}", resolution.submitter_delta));
    print_kv(
        "accuracy bonuses",
        &resolution.accuracy_bonuses.to_string(),
    );
    if resolution.expired {
        print_kv("via", "expiry sweep");
    }
}

pub fn show(db: &Path, trend: &str) -> Result<()> {
    let engine = open_engine(db)?;
    let t = engine.get_trend(trend)?;

    println!();
    print_kv("trend", &t.id);
    print_kv("submitter", &t.submitter_id);
    print_kv("category", t.category.as_str());
    print_kv("platform", t.platform.as_str());
    print_kv("quality", &format!("{:.2}", t.quality_score));
    print_kv("status", t.status.as_str());
    print_kv(
        "tally",
        &format!("{} yes / {} no / {} unsure", t.tally.yes, t.tally.no, t.tally.unsure),
    );
    print_kv("created", &t.created_at.to_rfc3339());
    if let Some(resolved) = t.resolved_at {
        print_kv("resolved", &resolved.to_rfc3339());
    }
    println!();
    Ok(())
}

pub fn summary(db: &Path, user: &str) -> Result<()> {
    let engine = open_engine(db)?;
    let summary = engine.user_xp_summary(user)?;

    println!();
    println!(
        "{}  {}",
        summary.user_id.bold(),
        format!("level {} {}", summary.level, summary.title).cyan()
    );
    print_kv("total xp", &summary.total_xp.to_string());
    print_kv("multiplier", &format!("{:.1}x", summary.multiplier));
    print_kv(
        "next level",
        &format!(
            "{} / {} ({}%)",
            summary.progress.xp_into_level, summary.progress.xp_for_next, summary.progress.percent
        ),
    );
    print_kv("session streak", &summary.session_streak.to_string());
    print_kv("daily streak", &summary.daily_streak.to_string());
    println!();
    Ok(())
}

pub fn queue(db: &Path) -> Result<()> {
    let engine = open_engine(db)?;
    let backlog = engine.outbox_backlog()?;

    if backlog.is_empty() {
        println!("intake queue empty");
        return Ok(());
    }
    println!();
    for entry in backlog {
        println!(
            "{}  {}  attempts={}  {}",
            entry.trend_id,
            entry.status.as_str(),
            entry.attempts,
            entry.last_error.as_deref().unwrap_or("-").dimmed()
        );
    }
    println!();
    Ok(())
}

pub fn sweep(db: &Path) -> Result<()> {
    let engine = open_engine(db)?;
    let reconciled = engine.run_reconciler_once()?;
    let expired = engine.sweep_expired()?;
    println!("reconciled {} queued submissions, resolved {} expired trends", reconciled, expired);
    Ok(())
}
