use std::fs;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use whiteboard::api::{ApiError, HttpWhiteboardClient, WhiteboardApi};
use whiteboard::autosave::MarkerPolicy;
use whiteboard::canvas::{CanvasError, MemoryCanvas, ShapeType};
use whiteboard::config::{DEFAULT_SAVE_DEBOUNCE_MS, DEFAULT_WHITEBOARD_ID, EditorConfig};
use whiteboard::editor::EditorSession;
use whiteboard::model::{ContentInput, WhiteboardRecord};
use whiteboard::notify::{Notifier, Severity, Toast};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("pass the whiteboard content with --data or --input")]
    MissingContent,
    #[error("whiteboard `{0}` not found")]
    NotFound(String),
    #[error("canvas operation failed: {0}")]
    Canvas(#[from] CanvasError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "whiteboard-cli", about = "Whiteboard API and autosave CLI")]
struct Cli {
    #[arg(long, env = "WHITEBOARD_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "WHITEBOARD_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Get {
        #[arg(default_value = DEFAULT_WHITEBOARD_ID)]
        id: String,
    },
    Create {
        id: String,
        #[command(flatten)]
        content: ContentArgs,
    },
    Update {
        id: String,
        #[command(flatten)]
        content: ContentArgs,
    },
    /// Drive a headless editor session: add shapes, convert them, autosave.
    Demo(DemoArgs),
}

#[derive(Args, Debug)]
struct ContentArgs {
    #[arg(long, conflicts_with = "input", help = "Inline JSON document")]
    data: Option<String>,

    #[arg(long, help = "Input file path, or - for stdin")]
    input: Option<String>,
}

#[derive(Args, Debug)]
struct DemoArgs {
    #[arg(long, env = "WHITEBOARD_ID", default_value = DEFAULT_WHITEBOARD_ID)]
    id: String,

    #[arg(long, default_value_t = 3)]
    shapes: usize,

    #[arg(long, help = "Convert the added shapes to this type")]
    convert_to: Option<ShapeType>,

    #[arg(long, env = "SAVE_DEBOUNCE_MS", default_value_t = DEFAULT_SAVE_DEBOUNCE_MS)]
    debounce_ms: u64,

    #[arg(long, env = "WHITEBOARD_MARKER_POLICY", default_value_t = MarkerPolicy::Optimistic)]
    marker_policy: MarkerPolicy,
}

/// Prints toasts the way a terminal user would want to see them.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, toast: Toast) {
        let tag = match toast.severity {
            Severity::Info => "info",
            Severity::Error => "error",
        };
        match toast.description {
            Some(description) => eprintln!("[{tag}] {}: {description}", toast.title),
            None => eprintln!("[{tag}] {}", toast.title),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let http = reqwest::Client::builder().timeout(Duration::from_secs(cli.timeout_secs)).build()?;
    let client = HttpWhiteboardClient::with_client(http, &cli.base_url)?;

    match cli.command {
        Command::Ping => {
            client.health().await?;
            println!("ok");
            Ok(())
        }
        Command::Get { id } => {
            let record = client.get_by_id(&id).await?.ok_or(CliError::NotFound(id))?;
            print_record(&record)
        }
        Command::Create { id, content } => {
            let record = client.create(&id, read_content(content)?).await?;
            print_record(&record)
        }
        Command::Update { id, content } => {
            let record = client.update(&id, read_content(content)?).await?;
            print_record(&record)
        }
        Command::Demo(args) => run_demo(client, args).await,
    }
}

async fn run_demo(client: HttpWhiteboardClient, args: DemoArgs) -> Result<(), CliError> {
    let config = EditorConfig {
        whiteboard_id: args.id.clone(),
        debounce: Duration::from_millis(args.debounce_ms),
        marker_policy: args.marker_policy,
    };
    let api: Arc<dyn WhiteboardApi> = Arc::new(client.clone());
    let session = EditorSession::open(config, api, Arc::new(StderrNotifier), None).await;
    if let Some(record) = session.initial_record() {
        eprintln!("loaded whiteboard {} (updated {})", record.id, record.updated_at);
    }

    let canvas = Arc::new(MemoryCanvas::new());
    let editor = session.mount(canvas.clone());

    let mut added = Vec::with_capacity(args.shapes);
    for _ in 0..args.shapes {
        added.push(editor.add_sample_shape()?);
    }

    if let Some(target) = args.convert_to {
        canvas.select(&added);
        let converted = editor.change_shape_type(target)?;
        eprintln!("converted {converted} shape(s) to {target}");
    }

    editor.close().await;

    let record = client.get_by_id(&args.id).await?.ok_or(CliError::NotFound(args.id))?;
    print_record(&record)
}

fn read_content(args: ContentArgs) -> Result<ContentInput, CliError> {
    let raw = match (args.data, args.input) {
        (Some(data), _) => data,
        (None, Some(path)) if path == "-" => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|source| CliError::Read { path: "stdin".to_owned(), source })?;
            buf
        }
        (None, Some(path)) => fs::read_to_string(&path).map_err(|source| CliError::Read { path, source })?,
        (None, None) => return Err(CliError::MissingContent),
    };
    // Validate locally so a typo fails before the request goes out.
    serde_json::from_str::<Value>(&raw)?;
    Ok(ContentInput::Text(raw))
}

fn print_record(record: &WhiteboardRecord) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(record)?;
    println!("{rendered}");
    Ok(())
}
