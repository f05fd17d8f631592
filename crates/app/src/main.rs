mod input;
mod logging;

use std::fmt;
use std::path::{Path, PathBuf};

use planner_core::handoff;
use planner_core::model::{PlanDocument, SessionStatus, Subject};
use planner_core::{FeedbackEvent, FeedbackVote};
use services::{AppServices, Clock, PlannerConfig, PlannerError, PlannerService};
use storage::repository::SnapshotId;

use crate::input::PlanInput;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidStatus { raw: String },
    InvalidLimit { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidStatus { raw } => write!(
                f,
                "invalid --status value: {raw} (expected not_started, in_progress, completed, up or down)"
            ),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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
    eprintln!("  cargo run -p app -- generate --input <file.json> [--out <plan.json>]");
    eprintln!(
        "  cargo run -p app -- mark     --plan <plan.json> --subject <name> [--topic <topic>] --status <status|up|down>"
    );
    eprintln!("  cargo run -p app -- show     --plan <plan.json>");
    eprintln!("  cargo run -p app -- history  [--limit <n>]");
    eprintln!("  cargo run -p app -- remote-plans");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --api <url>          study planner service (default http://localhost:5500)");
    eprintln!("  --db <sqlite_url>    local snapshot store (default sqlite://study_planner.sqlite3)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_PLANNER_API_URL, STUDY_PLANNER_TIMEOUT_SECS, STUDY_PLANNER_DEBOUNCE_MS,");
    eprintln!("  STUDY_PLANNER_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Generate,
    Mark,
    Show,
    History,
    RemotePlans,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "generate" => Some(Self::Generate),
            "mark" => Some(Self::Mark),
            "show" => Some(Self::Show),
            "history" => Some(Self::History),
            "remote-plans" => Some(Self::RemotePlans),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    api_url: Option<String>,
    db_url: String,
    input: Option<PathBuf>,
    out: Option<PathBuf>,
    plan: Option<PathBuf>,
    subject: Option<String>,
    topic: Option<String>,
    status: Option<SessionStatus>,
    limit: u32,
}

fn parse_status(raw: &str) -> Result<SessionStatus, ArgsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "up" => Ok(FeedbackVote::Up.status()),
        "down" => Ok(FeedbackVote::Down.status()),
        other => other.parse().map_err(|_| ArgsError::InvalidStatus {
            raw: raw.to_owned(),
        }),
    }
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        env_db_url: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: env_db_url.map_or_else(
                || "sqlite://study_planner.sqlite3".into(),
                normalize_sqlite_url,
            ),
            limit: 20,
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => parsed.api_url = Some(require_value(args, "--api")?),
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--input" => parsed.input = Some(require_value(args, "--input")?.into()),
                "--out" => parsed.out = Some(require_value(args, "--out")?.into()),
                "--plan" => parsed.plan = Some(require_value(args, "--plan")?.into()),
                "--subject" => parsed.subject = Some(require_value(args, "--subject")?),
                "--topic" => parsed.topic = Some(require_value(args, "--topic")?),
                "--status" => {
                    parsed.status = Some(parse_status(&require_value(args, "--status")?)?);
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    parsed.limit = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn validate(&self, cmd: Command) -> Result<(), ArgsError> {
        match cmd {
            Command::Generate if self.input.is_none() => {
                Err(ArgsError::MissingFlag { flag: "--input" })
            }
            Command::Mark | Command::Show if self.plan.is_none() => {
                Err(ArgsError::MissingFlag { flag: "--plan" })
            }
            Command::Mark if self.subject.is_none() => {
                Err(ArgsError::MissingFlag { flag: "--subject" })
            }
            Command::Mark if self.status.is_none() => {
                Err(ArgsError::MissingFlag { flag: "--status" })
            }
            _ => Ok(()),
        }
    }
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
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
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

    let path = Path::new(path);
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

fn read_plan(path: &Path) -> Result<PlanDocument, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(handoff::decode(Some(&raw))?)
}

fn write_plan(document: &PlanDocument, out: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let encoded = handoff::encode(document)?;
    match out {
        Some(path) => std::fs::write(path, encoded)?,
        None => println!("{encoded}"),
    }
    Ok(())
}

fn render_plan(document: &PlanDocument) -> String {
    use std::fmt::Write as _;

    let progress = document.progress();
    let mut out = String::new();
    let _ = writeln!(out, "Study plan for {}", document.current_date());
    let _ = writeln!(
        out,
        "Progress: {}/{} completed, {} in progress, {} not started ({}%)",
        progress.completed_sessions,
        progress.total_sessions,
        progress.in_progress_sessions,
        progress.not_started_sessions,
        progress.completion_percent()
    );
    for (slot, sessions) in document.sessions_by_time_slot() {
        let _ = writeln!(out, "\n{slot}");
        for session in sessions {
            let topic = session.topic.as_deref().unwrap_or("-");
            let _ = write!(
                out,
                "  [{}] {} / {} ({}h)",
                session.status, session.subject, topic, session.duration
            );
            if let Some(task) = &session.task {
                let _ = write!(out, ": {task}");
            }
            out.push('\n');
        }
    }
    if !document.tips().is_empty() {
        let _ = writeln!(out, "\nTips");
        for tip in document.tips() {
            let _ = writeln!(out, "  - {tip}");
        }
    }
    out
}

/// Record a status change the service already accepted.
///
/// The plan file is written first. Local history is best effort: a storage
/// failure is reported as a warning and yields `None`.
async fn save_marked(
    planner: &PlannerService,
    path: &Path,
    before: &PlanDocument,
    next: &PlanDocument,
) -> Result<Option<SnapshotId>, Box<dyn std::error::Error>> {
    write_plan(next, Some(path))?;

    let existing = match planner.latest().await {
        Ok(latest) => latest.and_then(|(id, doc)| (doc == *before).then_some(id)),
        Err(err) => {
            tracing::warn!(error = %err, "could not read latest snapshot");
            None
        }
    };
    match planner.persist(existing, next).await {
        Ok(id) => Ok(id),
        Err(err) => {
            tracing::warn!(error = %err, "plan file updated but local history was not");
            eprintln!("warning: local history not updated: {}", err.user_message());
            Ok(None)
        }
    }
}

async fn open_services(args: &Args) -> Result<AppServices, Box<dyn std::error::Error>> {
    let mut config = PlannerConfig::from_env();
    if let Some(url) = &args.api_url {
        config = config.with_base_url(url.clone());
    }
    prepare_sqlite_file(&args.db_url)?;
    Ok(AppServices::new_sqlite(&args.db_url, Clock::default_clock(), config).await?)
}

fn report(err: PlannerError) -> Box<dyn std::error::Error> {
    tracing::error!(error = %err, recoverable = err.is_recoverable(), "request failed");
    err.user_message().into()
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let mut iter = argv.into_iter().skip(1);
    let args = Args::parse(&mut iter, std::env::var("STUDY_PLANNER_DB_URL").ok())
        .and_then(|args| args.validate(cmd).map(|()| args))
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;

    match cmd {
        Command::Show => {
            let Some(path) = &args.plan else {
                return Err(ArgsError::MissingFlag { flag: "--plan" }.into());
            };
            print!("{}", render_plan(&read_plan(path)?));
            Ok(())
        }
        Command::Generate => {
            let Some(path) = &args.input else {
                return Err(ArgsError::MissingFlag { flag: "--input" }.into());
            };
            let input: PlanInput = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            let services = open_services(&args).await?;
            let mut form = input.into_form(services.new_registry())?;
            for err in &form.rejected {
                eprintln!("skipped input field: {err}");
            }

            let generated = services
                .planner()
                .generate(form.subjects.as_slice(), &mut form.registry, &form.exams)
                .await
                .map_err(report)?;
            write_plan(&generated.document, args.out.as_deref())?;
            if args.out.is_some() {
                eprint!("{}", render_plan(&generated.document));
            }
            Ok(())
        }
        Command::Mark => {
            let (Some(path), Some(subject), Some(status)) =
                (&args.plan, &args.subject, args.status)
            else {
                return Err(ArgsError::MissingFlag { flag: "--plan" }.into());
            };
            let document = read_plan(path)?;
            let event = FeedbackEvent::new(Subject::parse(subject)?, args.topic.as_deref(), status);

            let services = open_services(&args).await?;
            let planner = services.planner();
            let next = planner
                .submit_feedback(&document, &event)
                .await
                .map_err(report)?;

            save_marked(&planner, path, &document, &next).await?;

            let progress = next.progress();
            println!(
                "{} / {} marked {status}: {}/{} completed",
                event.subject(),
                event.topic().unwrap_or("-"),
                progress.completed_sessions,
                progress.total_sessions
            );
            Ok(())
        }
        Command::History => {
            let services = open_services(&args).await?;
            let rows = services
                .planner()
                .history(args.limit)
                .await
                .map_err(report)?;
            if rows.is_empty() {
                println!("no saved plans");
            }
            for row in rows {
                println!(
                    "#{:<4} {}  saved {}  {}/{} completed",
                    row.id,
                    row.plan_date,
                    row.saved_at.format("%Y-%m-%d %H:%M"),
                    row.completed,
                    row.total
                );
            }
            Ok(())
        }
        Command::RemotePlans => {
            let services = open_services(&args).await?;
            let plans = services
                .planner()
                .remote_plans()
                .await
                .map_err(report)?;
            println!("{}", serde_json::to_string_pretty(&remote_summary(&plans))?);
            Ok(())
        }
    }
}

fn remote_summary(plans: &[services::api::RemotePlanRecord]) -> Vec<serde_json::Value> {
    plans
        .iter()
        .map(|plan| {
            serde_json::json!({
                "id": plan.id,
                "subjects": plan.subjects,
                "created_at": plan.created_at,
            })
        })
        .collect()
}

#[tokio::main]
async fn main() {
    logging::init_logging();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
