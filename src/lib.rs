pub mod analysis;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod organize;
pub mod search;
pub mod traversal;

use std::io::{self, BufRead, Write};

use commands::{default_registry, CommandRegistry, Dispatch, ShellContext};
use config::ShellConfig;
use history::ActionLog;
use tracing_subscriber::EnvFilter;

const PROMPT: &str = "fmsh> ";

pub fn run() {
    // Optional .env next to the working directory
    let _ = dotenvy::dotenv();

    // RUST_LOG wins; otherwise FMSH_LOG, otherwise warn for dependencies and
    // info for this crate. Logs go to stderr so command output stays clean.
    let config = ShellConfig::from_env();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();
    config.report_rejected();
    tracing::debug!(?config, "Loaded configuration");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start the async runtime");
            return;
        }
    };

    let ctx = ShellContext::new(config, runtime.handle().clone(), ActionLog::new());
    let registry = default_registry();

    if let Err(e) = repl(&ctx, &registry) {
        tracing::error!(error = %e, "Shell terminated");
    }
}

/// Read commands from stdin until EOF or an exit word
fn repl(ctx: &ShellContext, registry: &CommandRegistry) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        write!(stdout, "{PROMPT}")?;
        stdout.flush()?;

        let Some(line) = lines.next() else {
            writeln!(stdout)?;
            return Ok(());
        };

        match registry.dispatch(ctx, &line?) {
            Dispatch::Output(output) => {
                if !output.is_empty() {
                    writeln!(stdout, "{output}")?;
                }
            }
            Dispatch::Failed(message) => eprintln!("Error: {message}"),
            Dispatch::NotFound(name) => {
                eprintln!("Unknown command: {name} (type 'help' for a list)")
            }
            Dispatch::Empty => {}
            Dispatch::Exit => return Ok(()),
        }
    }
}
