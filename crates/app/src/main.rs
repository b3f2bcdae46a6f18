use std::fmt;
use std::io::{self, BufRead, Write};

use lingua_core::model::{Percent, ProgressSummary, TenseId, TenseStatus, UserId};
use services::{AppServices, Clock, ServicesConfig, SyncOutcome};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidProgress { raw: String },
    InvalidStatus { raw: String },
    InvalidUser { raw: String },
    InvalidTense { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid database url: {raw}"),
            ArgsError::InvalidProgress { raw } => {
                write!(f, "invalid --progress value (0..=100): {raw}")
            }
            ArgsError::InvalidStatus { raw } => write!(f, "invalid --status value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::InvalidTense { raw } => write!(f, "invalid --tense value: {raw:?}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- show    [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- sync    --user <id>");
    eprintln!("  cargo run -p app -- update  --tense <id> --progress <0-100> --status <STATUS> [--user <id>]");
    eprintln!("  cargo run -p app -- quiz    --tense <id> [--user <id>]");
    eprintln!("  cargo run -p app -- explain --tense <id>");
    eprintln!();
    eprintln!("Global flags:");
    eprintln!("  --db <sqlite_url>         local progress cache (default sqlite://lingua.sqlite3)");
    eprintln!("  --remote-db <sqlite_url>  stand-in remote table (default sqlite://remote.sqlite3)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LINGUA_DB_URL, LINGUA_REMOTE_DB_URL, LINGUA_USER_ID");
    eprintln!("  LINGUA_REMOTE_URL, LINGUA_REMOTE_API_KEY, LINGUA_REMOTE_ACCESS_TOKEN,");
    eprintln!("  LINGUA_REMOTE_TIMEOUT_SECS, LINGUA_AI_API_KEY, LINGUA_AI_BASE_URL, LINGUA_AI_MODEL");
    eprintln!("  RUST_LOG (default info)");
}

#[derive(Debug, Clone)]
enum Command {
    Show,
    Sync {
        user: UserId,
    },
    Update {
        tense: TenseId,
        progress: Percent,
        status: TenseStatus,
        user: Option<UserId>,
    },
    Quiz {
        tense: TenseId,
        user: Option<UserId>,
    },
    Explain {
        tense: TenseId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Show,
    Sync,
    Update,
    Quiz,
    Explain,
}

impl CommandKind {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "show" => Some(Self::Show),
            "sync" => Some(Self::Sync),
            "update" => Some(Self::Update),
            "quiz" => Some(Self::Quiz),
            "explain" => Some(Self::Explain),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    remote_db_url: String,
    command: Command,
}

impl Args {
    fn parse(kind: CommandKind, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LINGUA_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://lingua.sqlite3".into(), normalize_sqlite_url);
        let mut remote_db_url = std::env::var("LINGUA_REMOTE_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://remote.sqlite3".into(), normalize_sqlite_url);
        let mut user = std::env::var("LINGUA_USER_ID").ok();
        let mut tense = None;
        let mut progress = None;
        let mut status = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => db_url = sqlite_flag(args, "--db")?,
                "--remote-db" => remote_db_url = sqlite_flag(args, "--remote-db")?,
                "--user" => user = Some(require_value(args, "--user")?),
                "--tense" => {
                    let value = require_value(args, "--tense")?;
                    let parsed = value
                        .parse::<TenseId>()
                        .map_err(|_| ArgsError::InvalidTense { raw: value.clone() })?;
                    tense = Some(parsed);
                }
                "--progress" => {
                    let value = require_value(args, "--progress")?;
                    let parsed = value
                        .parse::<u8>()
                        .ok()
                        .and_then(|v| Percent::new(v).ok())
                        .ok_or_else(|| ArgsError::InvalidProgress { raw: value.clone() })?;
                    progress = Some(parsed);
                }
                "--status" => {
                    let value = require_value(args, "--status")?;
                    let parsed = value
                        .parse::<TenseStatus>()
                        .map_err(|_| ArgsError::InvalidStatus { raw: value.clone() })?;
                    status = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let user = user
            .map(|raw| UserId::new(&raw).map_err(|_| ArgsError::InvalidUser { raw }))
            .transpose()?;
        let tense_flag = || tense.clone().ok_or(ArgsError::MissingFlag { flag: "--tense" });

        let command = match kind {
            CommandKind::Show => Command::Show,
            CommandKind::Sync => Command::Sync {
                user: user.ok_or(ArgsError::MissingFlag { flag: "--user" })?,
            },
            CommandKind::Update => Command::Update {
                tense: tense_flag()?,
                progress: progress.ok_or(ArgsError::MissingFlag { flag: "--progress" })?,
                status: status.ok_or(ArgsError::MissingFlag { flag: "--status" })?,
                user,
            },
            CommandKind::Quiz => Command::Quiz {
                tense: tense_flag()?,
                user,
            },
            CommandKind::Explain => Command::Explain {
                tense: tense_flag()?,
            },
        };

        Ok(Self {
            db_url,
            remote_db_url,
            command,
        })
    }
}

fn sqlite_flag(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    let value = require_value(args, flag)?;
    if value.trim().is_empty() {
        return Err(ArgsError::InvalidDbUrl { raw: value });
    }
    Ok(normalize_sqlite_url(value))
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_summary(summary: &ProgressSummary) {
    println!(
        "mastery {} | mastered {} | in progress {} | locked {}",
        summary.mastery_rate, summary.mastered, summary.in_progress, summary.locked
    );
    for group in &summary.categories {
        println!();
        println!("{}", group.category.label());
        for record in &group.records {
            let stamp = record
                .updated_at
                .map_or_else(|| "-".to_string(), |at| at.to_rfc3339());
            println!(
                "  {:<16} {:>4}  {:<12} {}",
                record.id.as_str(),
                record.progress.to_string(),
                record.status.as_str(),
                stamp
            );
        }
    }
}

fn prompt_line(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn run_quiz(
    services: &AppServices,
    tense: &TenseId,
    user: Option<&UserId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let practice = services.practice();
    let mut session = practice.start(tense).await?;

    while !session.is_complete() {
        let (step, total) = (session.step(), session.total());
        let question = practice.next_question(&mut session).await?;
        println!();
        println!("[{step}/{total}] {}", question.sentence);
        for (i, option) in question.options.iter().enumerate() {
            println!("  {}. {option}", i + 1);
        }
        let options = question.options.clone();
        let translation = question.translation.clone();

        let raw = prompt_line("> ")?;
        let answer = raw
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| options.get(i).cloned())
            .unwrap_or(raw);

        let result = practice.answer(&mut session, &answer)?;
        if result.correct {
            println!("correct ({translation})");
        } else {
            println!("wrong, answer: {} ({translation})", result.correct_answer);
        }
    }

    let updated = practice.finish(user, &session).await?;
    println!();
    println!(
        "{}/{} correct, {} is now {} ({})",
        session.correct(),
        session.total(),
        updated.id,
        updated.progress,
        updated.status
    );
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let kind = match argv.next() {
        None => CommandKind::Show,
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => CommandKind::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            io::Error::new(io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(kind, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let config = ServicesConfig::from_env()?;
    prepare_sqlite_file(&parsed.db_url)?;
    if config.remote.is_none() {
        prepare_sqlite_file(&parsed.remote_db_url)?;
    }
    let services =
        AppServices::new_sqlite(&parsed.db_url, &parsed.remote_db_url, Clock::default(), config)
            .await?;

    match parsed.command {
        Command::Show => {
            print_summary(&services.progress().summary().await?);
        }
        Command::Sync { user } => {
            let report = services.sync().sync(&user).await;
            match report.outcome {
                SyncOutcome::LocalUnavailable(error) => return Err(error.into()),
                SyncOutcome::Merged => println!(
                    "synced {} records, pushed {}",
                    report.records.len(),
                    report.uploads.len()
                ),
                SyncOutcome::RemoteUnavailable(ref error) => {
                    println!("remote unavailable ({error}), showing local progress");
                }
            }
            if let Some(error) = &report.upload_error {
                println!("push failed: {error}");
            }
            if let Some(error) = &report.storage_error {
                println!("local save failed: {error}");
            }
            print_summary(&ProgressSummary::from_snapshot(
                services.catalog(),
                report.records(),
            ));
        }
        Command::Update {
            tense,
            progress,
            status,
            user,
        } => {
            let updated = services
                .progress()
                .update(user.as_ref(), &tense, progress, status)
                .await?;
            println!("{} -> {} ({})", updated.id, updated.progress, updated.status);
        }
        Command::Quiz { tense, user } => {
            run_quiz(&services, &tense, user.as_ref()).await?;
        }
        Command::Explain { tense } => {
            let def = services
                .catalog()
                .get(&tense)
                .ok_or_else(|| ArgsError::InvalidTense {
                    raw: tense.to_string(),
                })?;
            println!("{} ({})", def.name, def.english_name);
            println!("{}", def.formula);
            println!();
            println!("{}", services.quiz().explain(def).await?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
