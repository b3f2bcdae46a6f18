use std::fmt;

use chrono::{DateTime, Duration, Utc};
use lingua_core::TenseCatalog;
use lingua_core::model::{Percent, RemoteProgressRecord, TenseStatus, UserId};
use storage::repository::RemoteProgressRepository;
use storage::sqlite::SqliteRepository;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: UserId,
    tenses: usize,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUser { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
    InvalidTenses { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
            ArgsError::InvalidTenses { raw } => write!(f, "invalid --tenses value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_user(value: String) -> Result<UserId, ArgsError> {
    UserId::new(value.clone()).map_err(|_| ArgsError::InvalidUser { raw: value })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LINGUA_REMOTE_DB_URL")
            .unwrap_or_else(|_| "sqlite://remote.sqlite3?mode=rwc".into());
        let mut user_id = parse_user(
            std::env::var("LINGUA_USER_ID").unwrap_or_else(|_| "demo-user".into()),
        )?;
        let mut tenses = 3;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user" => {
                    user_id = parse_user(require_value(&mut args, "--user")?)?;
                }
                "--tenses" => {
                    let value = require_value(&mut args, "--tenses")?;
                    tenses = value
                        .parse::<usize>()
                        .map_err(|_| ArgsError::InvalidTenses { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            tenses,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Seeds remote progress rows for one user, as if another device had synced.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         Remote SQLite URL (default: sqlite://remote.sqlite3)");
    eprintln!("  --user <id>               User id owning the rows (default: demo-user)");
    eprintln!("  --tenses <n>              Number of unlocked tenses to seed (default: 3)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LINGUA_REMOTE_DB_URL, LINGUA_USER_ID");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let repo = SqliteRepository::open(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let rows: Vec<RemoteProgressRecord> = TenseCatalog::builtin()
        .iter()
        .filter(|def| def.seed_status.is_practicable())
        .take(args.tenses)
        .zip(1_i64..)
        .map(|(def, i)| {
            let progress = Percent::saturating(i * 30);
            RemoteProgressRecord {
                user_id: args.user_id.clone(),
                tense_id: def.id.clone(),
                progress,
                status: TenseStatus::earned_for(progress),
                updated_at: now - Duration::hours(i),
            }
        })
        .collect();

    repo.upsert_many(&rows).await?;

    println!(
        "Seeded {} progress rows for {} into {}",
        rows.len(),
        args.user_id,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
