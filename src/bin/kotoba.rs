//! kotoba: command-line study companion
//!
//! Thin front end over the gateway and study session, mostly for trying out
//! keys, models and instruction templates from a terminal.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use clap::{Parser, Subcommand};
use kotoba::config::{Config, Secrets, build_gateway};
use kotoba::{
    Attachment, BuildInfo, GenerateRequest, InferenceGateway, KotobaError, StudySession,
};
use tokio::io::{AsyncBufReadExt, BufReader};

static LONG_VERSION: LazyLock<String> = LazyLock::new(|| BuildInfo::current().long_version());

/// Kotoba CLI
#[derive(Parser)]
#[command(name = "kotoba")]
#[command(version = kotoba::PKG_VERSION, long_version = LONG_VERSION.as_str())]
#[command(about = "Japanese study companion backed by Gemini")]
struct Args {
    /// Config file (default: ~/.kotoba/config.toml, then /etc/kotoba/config.toml)
    #[arg(short, long, env = "KOTOBA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a working backend and print it
    Probe,

    /// Send a single instruction
    Ask {
        /// Instruction text (or omit to read from stdin)
        text: Option<String>,
        /// Attach an image
        #[arg(long, conflicts_with = "audio")]
        image: Option<PathBuf>,
        /// Attach a WAV recording
        #[arg(long)]
        audio: Option<PathBuf>,
    },

    /// Extract lesson text from a photo
    Scan {
        /// Image of the lesson page
        image: PathBuf,
    },

    /// Pronunciation feedback on a recording of the lesson
    Feedback {
        /// Lesson text file
        #[arg(short, long)]
        lesson: PathBuf,
        /// WAV recording of the learner reading the lesson
        recording: PathBuf,
    },

    /// Role-play dialogue about a lesson
    Chat {
        /// Lesson text file
        #[arg(short, long, conflicts_with = "scan")]
        lesson: Option<PathBuf>,
        /// Lesson photo to scan first
        #[arg(long)]
        scan: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;
    let gateway = Arc::new(build_gateway(&config, &secrets)?);
    let session = || {
        StudySession::new(gateway.clone())
            .with_instructions(config.instructions.clone())
            .context_turns(config.session.context_turns)
    };

    let result = match args.command {
        Command::Probe => probe(&gateway).await,
        Command::Ask { text, image, audio } => {
            let text = resolve_text(text, "ask")?;
            let attachment = match (image, audio) {
                (Some(path), _) => Some(Attachment::image_from_path(path)?),
                (None, Some(path)) => Some(Attachment::wav_from_path(path)?),
                (None, None) => None,
            };
            let request = GenerateRequest::new(text).maybe_attachment(attachment);
            gateway
                .invoke_request(&request)
                .await
                .map(|reply| println!("{reply}"))
        }
        Command::Scan { image } => {
            let mut session = session();
            let image = Attachment::image_from_path(image)?;
            session
                .scan_lesson(image)
                .await
                .map(|lesson| println!("{lesson}"))
        }
        Command::Feedback { lesson, recording } => {
            let mut session = session();
            session.load_lesson(read_lesson(&lesson)?)?;
            let audio = Attachment::wav_from_path(recording)?;
            session
                .pronunciation_feedback(audio)
                .await
                .map(|feedback| println!("{feedback}"))
        }
        Command::Chat { lesson, scan } => {
            let mut session = session();
            if let Some(path) = lesson {
                session.load_lesson(read_lesson(&path)?)?;
            }
            if let Some(path) = scan {
                let image = Attachment::image_from_path(path)?;
                let lesson = session.scan_lesson(image).await.map_err(describe)?;
                println!("{lesson}\n");
            }
            chat(&mut session).await
        }
    };

    if let Err(e) = result {
        eprintln!("{}", describe(e));
        std::process::exit(1);
    }

    Ok(())
}

async fn probe(gateway: &InferenceGateway) -> kotoba::Result<()> {
    let resolver = gateway.resolver();
    println!("kotoba {}", kotoba::version_string());
    println!(
        "Probing {} model(s) with {} key(s)...",
        resolver.backends().len(),
        resolver.credentials().len()
    );
    let handle = gateway.backend().await?;
    println!("Using {} ({})", handle.target(), handle.provider_name());
    Ok(())
}

/// Interactive dialogue loop.
///
/// Plain lines are typed turns. `/voice <file.wav>` sends a recording,
/// `/restart` clears the dialogue, `/lesson <file>` swaps the lesson and
/// `/quit` exits.
async fn chat(session: &mut StudySession) -> kotoba::Result<()> {
    if session.lesson().is_none() {
        return Err(KotobaError::NoLesson);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/restart", _) => {
                session.restart_dialogue();
                println!("(dialogue restarted)");
                continue;
            }
            ("/lesson", path) => {
                match read_lesson(Path::new(path.trim())).and_then(|t| session.load_lesson(t)) {
                    Ok(()) => println!("(lesson loaded)"),
                    Err(e) => eprintln!("{}", describe(e)),
                }
                continue;
            }
            ("/voice", path) => match Attachment::wav_from_path(path.trim()) {
                Ok(audio) => session.say_voice(audio).await,
                Err(e) => Err(e),
            },
            _ => session.say(line).await,
        };

        // A failed turn leaves the history untouched, so the learner can retry.
        match reply {
            Ok(text) => println!("{text}\n"),
            Err(e) => eprintln!("{}", describe(e)),
        }
    }
    Ok(())
}

fn read_lesson(path: &Path) -> kotoba::Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

/// Learner-facing text for an error, with the technical detail after it.
fn describe(e: KotobaError) -> String {
    match e.failure_kind() {
        Some(kind) => format!("{}\n  ({e})", kind.user_message()),
        None => e.to_string(),
    }
}

/// Combine optional positional text with piped stdin.
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
