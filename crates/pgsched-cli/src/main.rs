//! `pgsched` — operator tool for the pgsched API and worker.
//!
//! Generates sealed-box key pairs, encrypts and decrypts values with them,
//! and inspects the settings the services would load from the current
//! environment. Key paths default to the same environment variables the
//! services read.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use tracing::info;

use pgsched_core::config::{ENV_PRIVATE_KEY_B64_PATH, Settings};
use pgsched_core::{database, logging, sealbox};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";

const PUBLIC_KEY_FILE: &str = "public_key.base64";
const PRIVATE_KEY_FILE: &str = "private_key.base64";

/// pgsched — scheduler key and configuration tool.
#[derive(Parser)]
#[command(
    name = "pgsched",
    version,
    about = "pgsched CLI — sealed-box keys, encryption, and config inspection",
    long_about = None,
    after_help = "Environment variables:\n  \
         PUBLIC_KEY_B64_PATH        Default public key for `encrypt`\n  \
         APP_PRIVATE_KEY_B64_PATH   Default private key for `decrypt`\n  \
         PG_DSN_APP                 Database for `db ping`\n\n\
         Examples:\n  \
         pgsched keygen --out-dir ./keys\n  \
         echo -n 'hunter2' | pgsched encrypt --public-key ./keys/public_key.base64\n  \
         pgsched config",
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new sealed-box key pair.
    Keygen {
        /// Directory to write public_key.base64 and private_key.base64 into.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Overwrite existing key files.
        #[arg(long)]
        force: bool,
    },
    /// Seal plaintext for the key holder; writes base64 ciphertext.
    Encrypt {
        /// Public key file (default: PUBLIC_KEY_B64_PATH).
        #[arg(long)]
        public_key: Option<PathBuf>,
        /// Plaintext file (default: stdin).
        #[arg(long)]
        input: Option<PathBuf>,
        /// Ciphertext file (default: stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Open base64 ciphertext produced by `encrypt`.
    Decrypt {
        /// Private key file (default: APP_PRIVATE_KEY_B64_PATH).
        #[arg(long)]
        private_key: Option<PathBuf>,
        /// Ciphertext file (default: stdin).
        #[arg(long)]
        input: Option<PathBuf>,
        /// Plaintext file (default: stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the effective settings as JSON (DSN password masked).
    Config,
    /// Database operations.
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Connect with PG_DSN_APP and run `SELECT 1`.
    Ping,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init_tracing(if cli.verbose { "debug" } else { "warn" }) {
        eprintln!("{RED}warning:{RESET} tracing subscriber not installed: {e}");
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{RED}{BOLD}error:{RESET} {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Keygen { out_dir, force } => cmd_keygen(&out_dir, force),
        Commands::Encrypt {
            public_key,
            input,
            output,
        } => cmd_encrypt(public_key, input.as_deref(), output.as_deref()),
        Commands::Decrypt {
            private_key,
            input,
            output,
        } => cmd_decrypt(private_key, input.as_deref(), output.as_deref()),
        Commands::Config => cmd_config(),
        Commands::Db { action } => match action {
            DbCommands::Ping => cmd_db_ping().await,
        },
    }
}

fn settings() -> Result<&'static Settings> {
    pgsched_core::current_config().context("failed to load settings from environment")
}

// ── Keys ─────────────────────────────────────────────────────────────

fn cmd_keygen(out_dir: &Path, force: bool) -> Result<()> {
    let public_path = out_dir.join(PUBLIC_KEY_FILE);
    let private_path = out_dir.join(PRIVATE_KEY_FILE);
    if !force {
        for path in [&public_path, &private_path] {
            if path.exists() {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
        }
    }
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let private_key = sealbox::PrivateKey::generate();
    let public_key = private_key.public_key();

    write_private_file(&private_path, private_key.to_base64().as_bytes())?;
    fs::write(&public_path, format!("{}\n", public_key.to_base64()))
        .with_context(|| format!("failed to write {}", public_path.display()))?;

    info!(dir = %out_dir.display(), "key pair generated");
    eprintln!("{GREEN}✓{RESET} wrote {}", public_path.display());
    eprintln!("{GREEN}✓{RESET} wrote {}", private_path.display());
    Ok(())
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ── Encryption ───────────────────────────────────────────────────────

fn cmd_encrypt(public_key: Option<PathBuf>, input: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let key_path = match public_key {
        Some(path) => path,
        None => settings()?.public_key_path().to_path_buf(),
    };
    let key = sealbox::read_public_key_file(&key_path)
        .with_context(|| format!("failed to load public key {}", key_path.display()))?;

    let plaintext = read_input(input)?;
    let ciphertext = sealbox::sealed_box_encrypt(&key, &plaintext)?;
    write_output(output, format!("{}\n", STANDARD.encode(ciphertext)).as_bytes())
}

fn cmd_decrypt(private_key: Option<PathBuf>, input: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let key_path = match private_key {
        Some(path) => path,
        None => settings()?.private_key_path().with_context(|| {
            format!("no private key given and {ENV_PRIVATE_KEY_B64_PATH} is not set")
        })?,
    };
    let key = sealbox::read_private_key_file(&key_path)
        .with_context(|| format!("failed to load private key {}", key_path.display()))?;

    let encoded: Vec<u8> = read_input(input)?
        .into_iter()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let ciphertext = STANDARD
        .decode(&encoded)
        .context("ciphertext is not valid base64")?;
    let plaintext = sealbox::sealed_box_decrypt(&key, &ciphertext)?;
    write_output(output, &plaintext)
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => fs::read(path).with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => fs::write(path, data).with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data).context("failed to write stdout")?;
            stdout.flush().context("failed to flush stdout")
        }
    }
}

// ── Settings & database ──────────────────────────────────────────────

fn cmd_config() -> Result<()> {
    let settings = settings()?;
    let json = serde_json::to_string_pretty(&settings.view()).context("failed to format settings")?;
    println!("{json}");
    Ok(())
}

async fn cmd_db_ping() -> Result<()> {
    let settings = settings()?;
    let pool = settings.database_engine()?;
    database::ping(pool).await?;
    eprintln!("{GREEN}✓{RESET} database reachable");
    Ok(())
}
