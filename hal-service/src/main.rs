// SPDX-License-Identifier: GPL-3.0-only

//! hald - hardware abstraction layer daemon
//!
//! Builds the device tree at startup, then keeps it in sync with kernel
//! hotplug events read from devd. The tree lives on a dedicated thread; the
//! tokio runtime runs the devd reader, the rescan ticker and every helper
//! process.

use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use hal_core::{ComputerInfo, Daemon, Hal, HalConfig, LoopEvent, LoopHandle, NoMergeRules};
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

mod callouts;
mod config;
mod devd;
mod error;
mod logging;

use callouts::ProcessCallouts;
use config::{DaemonConfig, LoggingLevel};

#[derive(Debug, Parser)]
#[command(name = "hald")]
#[command(about = "Hardware abstraction layer daemon", version)]
struct Args {
    /// Configuration file (defaults to /usr/local/etc/hald.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configuration
    #[arg(short, long)]
    verbose: bool,

    /// Print the device tree as JSON once the first probe is done
    #[arg(long)]
    dump_tree: bool,

    /// Probe once and exit without listening for hotplug events
    #[arg(long)]
    probe_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DaemonConfig::load_or_default(args.config.as_deref())?;
    if args.verbose {
        config.log_level = LoggingLevel::Debug;
    }
    logging::init(&config);

    info!("Starting hald v{}", env!("CARGO_PKG_VERSION"));

    if !nix::unistd::geteuid().is_root() {
        warn!("hald is not running as root; helpers may lack access to devices");
    }

    let (handle, source) = hal_core::channel();
    let callouts = ProcessCallouts::new(
        tokio::runtime::Handle::current(),
        &config.helper_path,
        config.helper_timeout(),
    );
    let hal = Hal::new(
        HalConfig {
            helper_timeout: config.helper_timeout(),
        },
        handle.clone(),
        source,
        NoMergeRules,
        callouts,
    );
    let daemon = Daemon::new(hal, computer_info(&config));

    let dump_tree = args.dump_tree;
    let probe_only = args.probe_only;
    let core = thread::Builder::new()
        .name("hald-core".to_string())
        .spawn(move || run_core(daemon, dump_tree, probe_only))
        .context("failed to start device tree thread")?;

    if !probe_only {
        tokio::spawn(devd::run_reader(
            config.devd_socket.clone(),
            config.reconnect_delay(),
            handle.clone(),
        ));
        spawn_rescan_ticker(&config, handle.clone());
        spawn_signal_listener(handle)?;
    }

    let joined = tokio::task::spawn_blocking(move || core.join()).await?;
    match joined {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("device tree thread panicked"),
    }

    info!("hald shutting down");
    Ok(())
}

fn run_core(mut daemon: Daemon, dump_tree: bool, probe_only: bool) -> Result<()> {
    daemon.probe().context("initial probe failed")?;
    info!(devices = daemon.hal().gdl().len(), "initial probe done");

    if dump_tree {
        let devices: Vec<_> = daemon.hal().gdl().iter().collect();
        println!("{}", serde_json::to_string_pretty(&devices)?);
    }

    if !probe_only {
        daemon.run();
    }
    Ok(())
}

fn computer_info(config: &DaemonConfig) -> ComputerInfo {
    let mut computer = ComputerInfo {
        hal_version: env!("CARGO_PKG_VERSION").to_string(),
        probe_smbios: config.probe_smbios,
        ..ComputerInfo::default()
    };

    match nix::sys::utsname::uname() {
        Ok(uts) => {
            computer.kernel_name = Some(uts.sysname().to_string_lossy().into_owned());
            computer.kernel_version = Some(uts.release().to_string_lossy().into_owned());
            computer.kernel_machine = Some(uts.machine().to_string_lossy().into_owned());
        }
        Err(e) => warn!("uname failed: {e}"),
    }
    computer
}

fn spawn_rescan_ticker(config: &DaemonConfig, handle: LoopHandle) {
    let Some(period) = config.rescan_interval() else {
        return;
    };

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; the initial probe already covers it.
        interval.tick().await;
        loop {
            interval.tick().await;
            if !handle.post(LoopEvent::Rescan) {
                break;
            }
        }
    });
}

fn spawn_signal_listener(handle: LoopHandle) -> Result<()> {
    let mut terminate = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("failed to listen for ctrl-c: {e}");
                    return;
                }
            }
            _ = terminate.recv() => {}
        }
        info!("Received shutdown signal");
        handle.post(LoopEvent::Shutdown);
    });
    Ok(())
}
