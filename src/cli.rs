use anyhow::{Context, ensure};
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};

const LOCAL_DEADLINE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch deadlines and send reminders until interrupted
    Run,
    /// Add a new task
    ///
    /// Example: taskminder add "Pay rent" --deadline 2025-06-01T18:00
    Add {
        text: String,
        /// RFC 3339 timestamp, or YYYY-MM-DDTHH:MM in the configured timezone
        #[arg(long)]
        deadline: Option<String>,
    },
    /// Toggle a task between pending and completed
    Done { id: String },
    /// Delete a task
    Delete { id: String },
    /// List tasks with their deadline status
    List,
    /// Show completion statistics
    Stats,
    /// Manage reminder recipients
    Email {
        #[command(subcommand)]
        command: EmailCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum EmailCommand {
    Add { address: String },
    Remove { address: String },
    List,
    /// Send a test email through the configured transport
    Test { address: String },
}

/// Accepts an RFC 3339 timestamp or a wall-clock time in `timezone`.
pub fn parse_deadline(input: &str, timezone: Tz) -> anyhow::Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(deadline) = DateTime::parse_from_rfc3339(input) {
        return Ok(deadline.with_timezone(&Utc));
    }

    let naive = LOCAL_DEADLINE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .with_context(|| format!("Unrecognized deadline {input:?}"))?;

    let local = naive
        .and_local_timezone(timezone)
        .earliest()
        .with_context(|| format!("Deadline {input:?} does not exist in {timezone}"))?;

    Ok(local.with_timezone(&Utc))
}

pub fn normalize_email(address: &str) -> anyhow::Result<String> {
    let address = address.trim().to_lowercase();
    let valid = match address.split_once('@') {
        Some((user, domain)) => {
            !user.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    ensure!(
        valid && !address.contains(char::is_whitespace),
        "Invalid email address {address:?}"
    );

    Ok(address)
}
