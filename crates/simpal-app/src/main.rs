//! simpal: run a shell command in a pseudo-terminal and show its output as
//! plain, selectable lines.

mod cli;
mod config;
mod ipc;
mod logging;
mod render_pump;

use std::io;

use anyhow::Context;
use simpal_pty::{start_session_with, NativeBackend};
use simpal_view::LineBuffer;
use tracing::{debug, info, warn};

use crate::cli::CliAction;
use crate::config::Config;
use crate::render_pump::{OutputMode, PumpExit};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = match cli::parse_args(std::env::args().skip(1)) {
        Ok(CliAction::Run(args)) => args,
        Ok(CliAction::Help) => {
            cli::print_usage();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("simpal {}", cli::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("simpal: {e}");
            eprintln!();
            cli::print_usage();
            std::process::exit(2);
        }
    };

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    debug!(?config, "configuration loaded");

    let mode = OutputMode::from_flags(args.quiet, args.json || config.json);
    let buffer = LineBuffer::new();
    let (sink, rx) = ipc::channel();

    info!(command = %args.command, "starting session");
    let session = config.session;
    start_session_with(
        NativeBackend::from_config(&session),
        sink,
        args.command,
        session,
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let exit = render_pump::run_pump(rx, &buffer, mode, &mut out, shutdown_signal())
        .await
        .context("failed to write output")?;

    if exit == PumpExit::Interrupted {
        warn!("interrupted before the command finished");
    }

    if !args.select.is_empty() {
        render_pump::select_ranges(&buffer, &args.select);
        render_pump::write_selection(&mut out, &buffer, mode)
            .context("failed to write selection")?;
    }

    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
