//! secretio CLI - read secrets from a terminal or a pipe
//!
//! Demonstrates the library: hidden line input on a terminal, whole-stream
//! input from a pipe, and colored reveal output.

use clap::{Parser, Subcommand};
use std::error::Error as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use secretio::error::{ErrorCategory, ErrorKind, Result, SecretioError};
use secretio::passphrase::{
    DEFAULT_PROMPT, PassphraseReader, PipedPassphraseReader, TerminalPassphraseReader,
};
use secretio::terminal::{self, DisplayConfig, ForegroundColor, Terminal};
use secretio::InputReader;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "secretio")]
#[command(version)]
#[command(about = "Read secrets from a terminal or a pipe.", long_about = None)]
struct Cli {
    /// Load display settings from a JSON file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Clear the screen when the terminal is set up
    #[arg(long, global = true)]
    clear_screen: bool,

    /// Foreground color for revealed text (black, red, green, yellow, blue,
    /// magenta, cyan, white)
    #[arg(long, global = true, value_name = "NAME")]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read one line of ASCII input, hidden when typed at a terminal
    #[command(alias = "l")]
    Line {
        /// Prompt shown on a terminal
        #[arg(short, long, default_value = DEFAULT_PROMPT)]
        prompt: String,

        /// Print the line after reading instead of its length
        #[arg(long)]
        reveal: bool,

        /// Reveal without color
        #[arg(long)]
        no_color: bool,
    },

    /// Read all of a piped or redirected stdin
    #[command(alias = "p")]
    Pipe,

    /// Print text in the reveal color
    #[command(alias = "r")]
    Reveal {
        text: String,

        /// Print without color
        #[arg(long)]
        no_color: bool,
    },
}

fn main() {
    init_tracing();
    install_restore_hooks();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Line {
            prompt,
            reveal,
            no_color,
        } => {
            let mut reader = TerminalPassphraseReader::stdin(config, prompt);
            let line = reader.read_passphrase()?;
            if reveal {
                let terminal = reader.terminal_mut();
                terminal.print_reveal(&line, !no_color)?;
                terminal.print("\n")?;
                terminal.refresh()?;
            } else {
                println!("read {} bytes", line.len());
            }
        }
        Commands::Pipe => {
            let mut reader = PipedPassphraseReader::new(InputReader::stdin());
            let data = reader.read_passphrase()?;
            println!("read {} bytes", data.len());
        }
        Commands::Reveal { text, no_color } => {
            let mut terminal = Terminal::stdout(config);
            terminal.print_reveal(text.as_bytes(), !no_color)?;
            terminal.print("\n")?;
            terminal.refresh()?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<DisplayConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => DisplayConfig::default(),
    };
    if cli.clear_screen {
        config.clear_screen = true;
    }
    if let Some(name) = cli.color.as_deref() {
        config.foreground = ForegroundColor::from_name(Some(name));
    }
    tracing::debug!(?config, "display configuration");
    Ok(config)
}

fn read_config(path: &Path) -> Result<DisplayConfig> {
    let data = fs::read_to_string(path).map_err(|e| {
        SecretioError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Config,
            format!("failed to read config {}: {}", path.display(), e),
            e,
        )
    })?;
    serde_json::from_str(&data).map_err(|e| {
        SecretioError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Config,
            format!("failed to parse config {}: {}", path.display(), e),
            e,
        )
    })
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("SECRETIO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Puts the terminal back if the process dies while echo is off.
fn install_restore_hooks() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        terminal::emergency_restore();
        original_hook(panic);
    }));

    #[cfg(unix)]
    install_signal_handler();
}

#[cfg(unix)]
fn install_signal_handler() {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM, SIGHUP]) {
        Ok(signals) => signals,
        Err(e) => {
            tracing::warn!("failed to install signal handlers: {}", e);
            return;
        }
    };
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            tracing::debug!(signal, "terminating on signal");
            terminal::emergency_restore();
            process::exit(128 + signal);
        }
    });
}
