//! `skeltrack` – skeleton tracker node
//!
//! This binary brings the tracker up and runs it until Ctrl-C.  It:
//!
//! 1. Loads `~/.skeltrack/config.toml` (defaults when absent) and applies
//!    `SKELTRACK_*` environment overrides.
//! 2. Opens the depth middleware from its XML configuration, checks its
//!    capabilities and primes the generators.
//! 3. Runs the fixed-rate tick loop, publishing joint frames, the roster and
//!    the default user on the bus.
//! 4. Intercepts **Ctrl-C** to leave the loop, stop generating and release the
//!    middleware.
//!
//! The exit code is `0` on a clean shutdown, `1` when a required capability
//! is missing, and the middleware status code when a bring-up check fails.

mod config;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

use skeltrack_hal::{SensorSession, SimDepthBackend};
use skeltrack_middleware::EventBus;
use skeltrack_runtime::{TrackerNode, init_tracing};
use skeltrack_types::{TrackerConfig, TrackerError};

fn main() -> ExitCode {
    let _guard = init_tracing("skeltrack");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down after this frame …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::from(e.exit_code());
        }
    };
    println!(
        "  Config:           {}",
        config::config_path().display().to_string().bold()
    );
    println!(
        "  Middleware XML:   {}",
        cfg.middleware_config_path.display().to_string().bold()
    );
    println!(
        "  Base frame:       {} @ {} Hz\n",
        cfg.camera_frame_id.bold(),
        cfg.tick_rate_hz
    );

    // ── Tracker ───────────────────────────────────────────────────────────
    match run(&cfg, &shutdown) {
        Ok(()) => {
            println!("{}", "  ✓ Middleware released. Exiting skeltrack.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Bring the middleware up and tick until `shutdown` is set.
fn run(cfg: &TrackerConfig, shutdown: &AtomicBool) -> Result<(), TrackerError> {
    // No vendor binding ships with this workspace; the simulated middleware
    // walks a demo user through the full lifecycle.
    let backend = SimDepthBackend::demo();
    let mut session = SensorSession::open(backend, &cfg.middleware_config_path)?;
    session.start_primed()?;

    let bus = EventBus::default();
    info!(
        node = %bus.node_name(),
        roster = %bus.resolve(skeltrack_middleware::Topic::AvailableTrackedUsers),
        default_user = %bus.resolve(skeltrack_middleware::Topic::DefaultUser),
        "publishers ready"
    );
    TrackerNode::new(session, bus, cfg).run(shutdown)
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   _____ __ __    ____  __                  __  "#.bold().cyan());
    println!("{}", r#"  / ___// //_/__ / / /_/ /________ _ ____  / /__"#.bold().cyan());
    println!("{}", r#"  \__ \/ ,< / -_) / __/ __/ __/ _ `// __/ /  '_/"#.bold().cyan());
    println!("{}", r#" ___/ / /| |\__/_/\__/\__/_/  \_,_/ \__/ /_/\_\ "#.bold().cyan());
    println!("{}", r#"/____/_/ |_|                                    "#.bold().cyan());
    println!();
    println!("  {} {}",
        "skeltrack".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Skeleton tracking as named coordinate frames");
    println!();
}
