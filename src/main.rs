//! # Studio CLI (`studio`)
//!
//! Upload documents, ask questions grounded in them, and run the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! studio --config ./config/studio.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `studio upload <file>` | Extract, chunk, embed, and index one document |
//! | `studio ask "<question>"` | Answer a question from the indexed documents |
//! | `studio list` | List indexed documents |
//! | `studio ingest <dir>` | Upload every supported file under a directory |
//! | `studio serve` | Start the HTTP API |
//!
//! Without `--config`, `./config/studio.toml` is used when present;
//! otherwise defaults apply with the store at `./studio-data`.
//!
//! ## Examples
//!
//! ```bash
//! studio upload ./handbook.pdf --name "Employee Handbook" --description "2024 edition"
//! studio ask "How many vacation days do new hires get?"
//! studio ingest ./shared-docs --exclude "**/archive/**"
//! studio serve
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use studio_qa::assistant::Assistant;
use studio_qa::config::{self, Config};
use studio_qa::ingest::{self, IngestOptions};
use studio_qa::logging::init_tracing;
use studio_qa::server::{self, AppState};
use studio_qa::session::{AccessPolicy, Session, LOGIN_REQUIRED};

const DEFAULT_CONFIG: &str = "./config/studio.toml";
const DEFAULT_STORE: &str = "./studio-data";

/// Studio: a document question-answering assistant.
#[derive(Parser)]
#[command(name = "studio", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `[store] root`.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Username, when credentials are configured.
    #[arg(long, global = true)]
    username: Option<String>,

    /// Password, when credentials are configured.
    #[arg(long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a single document.
    Upload {
        /// File to upload (.pdf, .docx, .txt, .xlsx, .csv).
        file: PathBuf,
        /// Display name. Defaults to the file name.
        #[arg(long)]
        name: Option<String>,
        /// Free-text description.
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Ask a question about the indexed documents.
    Ask {
        question: String,
    },
    /// List indexed documents.
    List,
    /// Upload every supported file under a directory.
    Ingest {
        dir: PathBuf,
        /// Include glob (repeatable). Defaults to all supported extensions.
        #[arg(long = "include")]
        include: Vec<String>,
        /// Exclude glob (repeatable), in addition to .git, target, node_modules.
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        #[arg(long)]
        follow_symlinks: bool,
    },
    /// Start the HTTP API on `[server] bind`.
    Serve,
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            config::load_config(Path::new(DEFAULT_CONFIG))?
        }
        None => Config::minimal(DEFAULT_STORE),
    };
    if let Some(store) = &cli.store {
        cfg.store.root = store.clone();
    }
    Ok(cfg)
}

fn cli_session(cli: &Cli, policy: &AccessPolicy) -> Session {
    let presented = match (&cli.username, &cli.password) {
        (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
        _ => None,
    };
    policy.authenticate(presented)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = resolve_config(&cli)?;
    init_tracing(cfg.logging.dir.as_deref());

    let policy = AccessPolicy::from_env(&cfg.auth);
    let assistant = Assistant::from_config(&cfg)?;

    match &cli.command {
        Commands::Upload {
            file,
            name,
            description,
        } => {
            let session = cli_session(&cli, &policy);
            let mut request = ingest::read_upload(file)?;
            if let Some(name) = name {
                request.document_name = name.clone();
            }
            request.document_description = description.clone();
            let response = assistant.upload(&session, request).await;
            println!("{}", response.message);
        }
        Commands::Ask { question } => {
            let session = cli_session(&cli, &policy);
            println!("{}", assistant.ask(&session, question).await);
        }
        Commands::List => {
            let session = cli_session(&cli, &policy);
            if !session.is_logged_in() {
                println!("{}", LOGIN_REQUIRED);
                return Ok(());
            }
            let docs = assistant.documents();
            if docs.is_empty() {
                println!("No documents indexed.");
            } else {
                println!("{:<40} {:>10}  {}", "DOCUMENT", "BYTES", "KEY");
                for (key, info) in docs {
                    println!("{:<40} {:>10}  {}", info.document_name, info.file_size, key);
                }
            }
        }
        Commands::Ingest {
            dir,
            include,
            exclude,
            follow_symlinks,
        } => {
            let session = cli_session(&cli, &policy);
            let mut options = IngestOptions::new(dir);
            if !include.is_empty() {
                options.include_globs = include.clone();
            }
            options.exclude_globs = exclude.clone();
            options.follow_symlinks = *follow_symlinks;
            ingest::run_ingest_dir(&assistant, &session, &options).await?;
        }
        Commands::Serve => {
            if !policy.requires_login() {
                tracing::warn!(
                    username_env = %cfg.auth.username_env,
                    password_env = %cfg.auth.password_env,
                    "no credentials configured; API is open"
                );
            }
            let state = AppState {
                assistant: Arc::new(assistant),
                policy: Arc::new(policy),
                max_body_bytes: cfg.server.max_body_bytes,
            };
            server::run_server(&cfg, state).await?;
        }
    }

    Ok(())
}
