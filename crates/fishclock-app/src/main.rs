//! Fish Clock entry point.
//!
//! Wires the backend service, the notification bus and the windows
//! together.  Without a native window toolkit this runs headless: it opens
//! the main clock window, optionally commits edits from a settings window,
//! and reports the configuration each window ends up with.
//!
//! ```text
//! main()
//!  └─ ConfigService::open()   -- owns config.toml
//!  └─ HostGateway             -- windows reach the service through commands
//!  └─ LocalBus | EventBus     -- config:update notifications
//!  └─ Window(Main)            -- subscribes, then loads
//!  └─ Window(Settings)        -- only when edits were given on the command line
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fishclock_app::application::bus::NotificationBus;
use fishclock_app::application::commit_settings::commit_settings;
use fishclock_app::application::gateway::PersistenceGateway;
use fishclock_app::infrastructure::bus::{event_bus::EventBus, local::LocalBus};
use fishclock_app::infrastructure::gateway::host::HostGateway;
use fishclock_app::infrastructure::ui_bridge::ConfigService;
use fishclock_app::infrastructure::window::Window;
use fishclock_core::{Config, View};

/// How long a window may take to observe a committed change.
const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(2);

/// Which notification bus carries `config:update` between windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BusKind {
    /// Synchronous in-process fan-out.
    Local,
    /// Tokio broadcast channels; delivery happens on spawned tasks.
    Async,
}

/// Fish Clock: a desktop countdown to the end of the workday and to payday.
#[derive(Debug, Parser)]
#[command(name = "fish-clock", version)]
struct Cli {
    /// Configuration file.  Defaults to `config.toml` in the platform config
    /// directory.
    #[arg(long, env = "FISHCLOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Notification bus used between windows.
    #[arg(long, value_enum, default_value_t = BusKind::Local, env = "FISHCLOCK_BUS")]
    bus: BusKind,

    /// Window opacity to commit, between 0.0 and 1.0.
    #[arg(long)]
    opacity: Option<f64>,

    /// Hour the workday starts (0-23).
    #[arg(long)]
    work_start: Option<i32>,

    /// Hour the workday ends (0-23).
    #[arg(long)]
    work_end: Option<i32>,

    /// Monthly salary.
    #[arg(long)]
    salary: Option<i32>,

    /// Day of the month salary is paid (1-31).
    #[arg(long)]
    payday: Option<i32>,

    /// Keep the windows open until Ctrl-C, logging every change they see.
    #[arg(long)]
    watch: bool,
}

impl Cli {
    fn has_edits(&self) -> bool {
        self.opacity.is_some()
            || self.work_start.is_some()
            || self.work_end.is_some()
            || self.salary.is_some()
            || self.payday.is_some()
    }

    /// Applies the command-line edits on top of `base`.
    fn apply_edits(&self, base: Config) -> Config {
        Config {
            work_start_hour: self.work_start.unwrap_or(base.work_start_hour),
            work_end_hour: self.work_end.unwrap_or(base.work_end_hour),
            monthly_salary: self.salary.unwrap_or(base.monthly_salary),
            payday: self.payday.unwrap_or(base.payday),
            opacity: self.opacity.unwrap_or(base.opacity),
        }
    }
}

fn make_bus(kind: BusKind) -> Arc<dyn NotificationBus> {
    match kind {
        BusKind::Local => Arc::new(LocalBus::new()),
        BusKind::Async => Arc::new(EventBus::new(tokio::runtime::Handle::current())),
    }
}

/// Polls `window` until its replica holds `expected` or the timeout passes.
async fn wait_for(window: &Window, expected: &Config) -> bool {
    tokio::time::timeout(CONVERGENCE_TIMEOUT, async {
        while window.store().get().as_ref() != Some(expected) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let service = match &cli.config {
        Some(path) => ConfigService::open(path.clone()),
        None => ConfigService::open_default(),
    }
    .context("failed to open configuration")?;
    info!(path = %service.path().display(), bus = ?cli.bus, "Fish Clock starting");

    let gateway: Arc<dyn PersistenceGateway<Config>> = Arc::new(HostGateway::new(service));
    let bus = make_bus(cli.bus);

    let main_window = Window::open(View::Main, Arc::clone(&gateway), Arc::clone(&bus));
    let window_id = main_window.id();
    let _watcher = main_window.store().subscribe(move |cfg| {
        if let Some(cfg) = cfg {
            info!(
                window = %window_id,
                "work {:02}:00-{:02}:00, payday {}, opacity {:.2}",
                cfg.work_start_hour, cfg.work_end_hour, cfg.payday, cfg.opacity
            );
        }
    });
    main_window
        .store()
        .load()
        .await
        .context("main window failed to load configuration")?;

    if cli.has_edits() {
        let settings = Window::open(View::Settings, Arc::clone(&gateway), Arc::clone(&bus));
        settings
            .store()
            .load()
            .await
            .context("settings window failed to load configuration")?;

        let committed = commit_settings(settings.store(), |current| {
            cli.apply_edits(current.unwrap_or_default())
        })
        .await
        .context("failed to commit settings")?;

        if !wait_for(&main_window, &committed).await {
            warn!(window = %window_id, "main window did not observe the committed settings");
        }
        settings.close();
    }

    if cli.watch {
        info!("watching for configuration changes.  Press Ctrl-C to exit.");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        info!("shutdown signal received");
    }

    main_window.close();
    info!("Fish Clock stopped");
    Ok(())
}
