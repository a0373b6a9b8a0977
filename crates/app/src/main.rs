use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use exam_core::model::{DEFAULT_KEY_NAMESPACE, Exam, ExamId, QuestionId, SaveStatus, Username};
use services::{
    AppServices, AutosaveConfig, Clock, Countdown, ExamSession, ResumeChoice, format_remaining,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{Command, print_help};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingUser,
    InvalidDuration { raw: String },
    InvalidDbUrl { raw: String },
    EmptyQuestions,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingUser => write!(f, "--user (or EXAM_USER) is required"),
            ArgsError::InvalidDuration { raw } => write!(f, "invalid --duration-mins value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::EmptyQuestions => write!(f, "--questions needs at least one id"),
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
    eprintln!("  cargo run -p app -- --user <name> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>        default exam.sqlite3");
    eprintln!("  --exam <id>              default EXAM1");
    eprintln!("  --title <text>           default \"Practice Exam\"");
    eprintln!("  --duration-mins <n>      default 10");
    eprintln!("  --questions <Q1,Q2,..>   default Q1..Q5");
    eprintln!("  --namespace <prefix>     progress key prefix (default {DEFAULT_KEY_NAMESPACE})");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_USER, EXAM_ID, RUST_LOG");
}

struct Args {
    db_url: String,
    username: Username,
    exam_id: ExamId,
    title: String,
    duration_minutes: u32,
    question_ids: Vec<QuestionId>,
    namespace: String,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url =
            sqlite_url_for(&std::env::var("EXAM_DB_URL").unwrap_or_else(|_| "exam.sqlite3".into()));
        let mut username = std::env::var("EXAM_USER").ok();
        let mut exam_id = std::env::var("EXAM_ID").unwrap_or_else(|_| "EXAM1".into());
        let mut title = "Practice Exam".to_owned();
        let mut duration_minutes = 10_u32;
        let mut question_ids: Vec<QuestionId> =
            (1..=5).map(|n| QuestionId::new(format!("Q{n}"))).collect();
        let mut namespace = DEFAULT_KEY_NAMESPACE.to_owned();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = sqlite_url_for(&value);
                }
                "--user" => username = Some(require_value(args, "--user")?),
                "--exam" => exam_id = require_value(args, "--exam")?,
                "--title" => title = require_value(args, "--title")?,
                "--duration-mins" => {
                    let value = require_value(args, "--duration-mins")?;
                    duration_minutes = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidDuration { raw: value.clone() })?;
                }
                "--questions" => {
                    let value = require_value(args, "--questions")?;
                    question_ids = value
                        .split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(QuestionId::new)
                        .collect();
                    if question_ids.is_empty() {
                        return Err(ArgsError::EmptyQuestions);
                    }
                }
                "--namespace" => namespace = require_value(args, "--namespace")?,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let username = username
            .filter(|name| !name.trim().is_empty())
            .ok_or(ArgsError::MissingUser)?;

        Ok(Self {
            db_url,
            username: Username::new(username),
            exam_id: ExamId::new(exam_id),
            title,
            duration_minutes,
            question_ids,
            namespace,
        })
    }
}

/// Turns `--db` input (a bare path or a `sqlite:` URL) into an absolute
/// `sqlite://` URL.
fn sqlite_url_for(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("sqlite://") {
        return raw.to_owned();
    }
    let path = Path::new(raw.strip_prefix("sqlite:").unwrap_or(raw));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Creates the database file and its directory so the pool can open it.
fn ensure_db_file(db_url: &str) -> std::io::Result<()> {
    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = Path::new(rest.split_once('?').map_or(rest, |(path, _)| path));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(())
}

fn print_question(session: &ExamSession) {
    let progress = session.progress();
    let Some(question) = session.current_question() else {
        return;
    };
    let answer = session
        .answer(question)
        .map_or_else(|| "-".to_owned(), |value| format!("{value:?}"));
    println!(
        "[{}/{}] {question}  answer: {answer}  ({} answered, {} left)",
        progress.current_index + 1,
        progress.total,
        progress.answered,
        format_remaining(session.remaining_secs()),
    );
}

fn print_status(session: &ExamSession) {
    let markers: Vec<String> = session
        .question_markers()
        .into_iter()
        .map(|marker| {
            let mark = if marker.answered { "x" } else { " " };
            if marker.current {
                format!(">{}[{mark}]", marker.question_id)
            } else {
                format!(" {}[{mark}]", marker.question_id)
            }
        })
        .collect();
    println!("{}", markers.join(" "));
    let save = match session.save_status() {
        SaveStatus::Idle => "",
        SaveStatus::Saving => "saving...",
        SaveStatus::Saved => "saved",
    };
    if !save.is_empty() {
        println!("autosave: {save}");
    }
    print_question(session);
}

fn print_result(session: &ExamSession) {
    if let Some(submission) = session.submission() {
        println!(
            "Submitted ({}) with {} of {} answered, {} remaining.",
            submission.reason(),
            submission.answers().answered_count(),
            submission.answers().len(),
            format_remaining(submission.remaining_secs()),
        );
    }
}

/// Applies one command. Returns `false` when the runner should stop.
async fn handle_command(session: &mut ExamSession, command: Command) -> bool {
    if session.resume_offer().is_some() {
        let choice = match command {
            Command::Resume | Command::Yes => ResumeChoice::Resume,
            Command::StartNew | Command::No => ResumeChoice::Discard,
            Command::Quit => return false,
            _ => {
                println!("Saved progress found. Type `resume` or `new`.");
                return true;
            }
        };
        session.resolve_resume(choice).await;
        print_question(session);
        return true;
    }

    if session.is_confirming_finish() {
        match command {
            Command::Yes => {
                if let Err(err) = session.confirm_finish().await {
                    eprintln!("submission failed: {err}");
                }
                return true;
            }
            Command::No => {
                session.cancel_finish();
                println!("Finish cancelled.");
                return true;
            }
            _ => session.cancel_finish(),
        }
    }

    match command {
        Command::Answer(value) => {
            if session.answer_current(value) {
                print_question(session);
            }
        }
        Command::Next => {
            session.next_question();
            print_question(session);
        }
        Command::Previous => {
            session.previous_question();
            print_question(session);
        }
        Command::GoTo(number) => {
            if !session.go_to(number - 1) {
                println!("No question {number}.");
            }
            print_question(session);
        }
        Command::Save => {
            if session.manual_save().await || session.manual_save_visible() {
                println!("Progress saved.");
            } else {
                println!("Could not save progress; your answers are kept in memory.");
            }
        }
        Command::Finish => {
            if session.request_finish() {
                println!("Finish the exam? Answers cannot be changed afterwards. (yes/no)");
            }
        }
        Command::Status => print_status(session),
        Command::Help => print_help(),
        Command::Quit => return false,
        Command::Yes | Command::No | Command::Resume | Command::StartNew => {
            println!("Nothing to confirm.");
        }
    }
    true
}

/// Sleeps until the session's next autosave or indicator deadline.
async fn sleep_until_deadline(deadline: Option<DateTime<Utc>>) {
    match deadline {
        Some(at) => {
            let wait = (at - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
        }
        None => std::future::pending().await,
    }
}

async fn run_exam(mut session: ExamSession) -> Result<(), Box<dyn std::error::Error>> {
    println!("{} ({} questions)", session.exam().title(), session.exam().question_count());
    if session.resume_offer().is_some() {
        println!("We found unfinished progress for this exam. Resume it? (resume/new)");
    } else {
        print_question(&session);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let mut countdown: Option<Countdown> = None;
    let mut last_tick = tokio::time::Instant::now();

    while !session.is_finished() {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(command) => {
                        if !handle_command(&mut session, command).await {
                            break;
                        }
                    }
                    Err(err) => println!("{err}"),
                }
            }
            now = ticker.tick() => {
                let elapsed = now.duration_since(last_tick);
                last_tick = now;
                if session.is_active() && countdown.is_none() {
                    countdown = Some(Countdown::new(session.remaining_secs()));
                }
                if let Some(signal) = countdown.as_mut().and_then(|c| c.tick(elapsed)) {
                    if let Err(err) = session.on_timer(signal).await {
                        eprintln!("submission failed: {err}");
                    }
                }
            }
            () = sleep_until_deadline(session.next_deadline()) => {
                session.tick().await;
            }
        }
    }

    if session.is_finished() {
        if session.submission_id().is_none() {
            session.retry_submission().await?;
        }
        print_result(&session);
    } else {
        let saved = session.flush().await;
        session.close();
        if saved {
            println!("Exam paused. Your progress is saved for next time.");
        } else {
            println!("Exam paused, but your latest answers could not be saved.");
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let exam = Exam::new(
        args.exam_id,
        args.title,
        args.duration_minutes,
        args.question_ids,
    )?;

    ensure_db_file(&args.db_url)?;
    let app = AppServices::new_sqlite(
        &args.db_url,
        Clock::system(),
        &args.namespace,
        AutosaveConfig::default(),
    )
    .await?;

    let sessions = app.exam_sessions();
    if let Some(previous) = sessions
        .latest_submission(exam.id(), &args.username)
        .await?
    {
        println!(
            "Last attempt submitted {} ({}).",
            previous.submission.submitted_at().format("%Y-%m-%d %H:%M UTC"),
            previous.submission.reason(),
        );
    }
    let session = sessions.start_session(exam, args.username).await?;
    tracing::info!(key = %session.key(), "exam session started");
    run_exam(session).await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,app=info,services=info,storage=info")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_url_for_makes_paths_absolute() {
        assert_eq!(sqlite_url_for("sqlite:///tmp/a.db"), "sqlite:///tmp/a.db");
        assert_eq!(sqlite_url_for("sqlite:/tmp/b.db"), "sqlite:///tmp/b.db");
        assert_eq!(sqlite_url_for(" /tmp/c.db "), "sqlite:///tmp/c.db");

        let relative = sqlite_url_for("exam.sqlite3");
        assert!(relative.starts_with("sqlite:///"));
        assert!(relative.ends_with("/exam.sqlite3"));
    }
}
