//! Main application logic and lifecycle management.
//!
//! The `Application` struct starts the server, reports room statistics and
//! drives graceful shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, setup_signal_handlers_silent},
};
use conquest_server::{GameServer, MetricsSnapshot, RoomMetrics, ShutdownState};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(8);

/// Main application struct.
///
/// # Architecture
///
/// * **Configuration Management**: Loads and validates configuration from files and CLI
/// * **Server Orchestration**: Initializes and manages the game server instance
/// * **Health Monitoring**: Periodic room statistics
/// * **Graceful Shutdown**: Handles termination signals and cleanup procedures
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Game server instance
    server: Arc<GameServer>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Initialize game server with configuration
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let config = AppConfig::load_from_file(&args.config_path).await?;
        let config = apply_overrides(config, &args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server_config = config.to_server_config()?;
        let server = Arc::new(GameServer::new(server_config));

        Ok(Self { config, server })
    }

    /// Runs the server until a termination signal arrives, then shuts it
    /// down and reports final statistics.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.log_configuration_summary();

        // Bind before spawning so an unusable address fails startup
        let listener = self.server.bind().await?;
        let shutdown_state = ShutdownState::new();
        let metrics = self.server.room().metrics();

        let server_handle = {
            let server = self.server.clone();
            let shutdown_state = shutdown_state.clone();
            tokio::spawn(async move {
                match server.serve(listener, Some(shutdown_state)).await {
                    Ok(()) => info!("✅ Server completed successfully"),
                    Err(e) => error!("❌ Server error: {:?}", e),
                }
            })
        };

        let monitoring_handle = spawn_monitoring(self.server.clone(), self.config.logging.stats_interval_secs);

        info!("✅ Conquest server is now running!");
        info!("🎮 Ready to accept connections on {}", self.config.server.bind_address);
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        setup_signal_handlers().await?;

        // A second signal skips the graceful path
        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        if let Some(handle) = monitoring_handle {
            handle.abort();
        }

        shutdown_state.initiate_shutdown();
        self.server.shutdown().await?;

        info!("⏳ Waiting for server task to complete gracefully...");
        match timeout(SERVER_STOP_TIMEOUT, server_handle).await {
            Ok(_) if shutdown_state.is_shutdown_complete() => info!("✅ Server task completed gracefully"),
            Ok(_) => warn!("⚠️ Server task ended without completing shutdown"),
            Err(_) => warn!("⏰ Server task did not complete within {:?}, proceeding", SERVER_STOP_TIMEOUT),
        }

        log_final_statistics(&metrics.snapshot());
        info!("✅ Conquest server shutdown complete");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        let room = &self.config.room;
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  🌍 World: {}x{} cells of {} units", room.width, room.height, room.rules.cell_size);
        info!(
            "  ⏱️ Tick every {}ms, snapshot every {}ms",
            room.tick_interval_ms, room.broadcast_interval_ms
        );
        info!(
            "  👥 Max connections: {} | Max agents: {}",
            self.config.server.max_connections, room.rules.max_agents
        );
        info!("  💓 Connection timeout: {}s", self.config.server.connection_timeout);
    }
}

fn apply_overrides(mut config: AppConfig, args: &CliArgs) -> AppConfig {
    if let Some(bind_address) = &args.bind_address {
        config.server.bind_address = bind_address.clone();
    }
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config
}

/// Reports room and connection statistics every `every_secs` seconds.
/// Disabled at 0.
fn spawn_monitoring(server: Arc<GameServer>, every_secs: u64) -> Option<JoinHandle<()>> {
    if every_secs == 0 {
        return None;
    }
    let metrics: Arc<RoomMetrics> = server.room().metrics();

    Some(tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(every_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        let mut last = metrics.snapshot();

        loop {
            ticker.tick().await;
            let now = metrics.snapshot();
            let (connections, joined) = server.connection_counts().await;
            info!("🔗 Connections - {} open | {} playing", connections, joined);
            info!(
                "📊 Room health - {} agents | {} ticks | last tick {}µs (max {}µs) | {} frames | {} captures | {} eliminations",
                now.agents,
                now.ticks - last.ticks,
                now.last_tick_micros,
                now.max_tick_micros,
                now.frames_sent - last.frames_sent,
                now.captures - last.captures,
                now.eliminations - last.eliminations,
            );
            if now.repairs > last.repairs {
                warn!("⚠️ {} agents were reset by the world audit", now.repairs - last.repairs);
            }
            last = now;
        }
    }))
}

fn log_final_statistics(stats: &MetricsSnapshot) {
    info!("📊 Final Statistics:");
    info!("  - Uptime: {}s", stats.uptime_seconds);
    info!("  - Ticks run: {}", stats.ticks);
    info!("  - Slowest tick: {}µs", stats.max_tick_micros);
    info!("  - Frames broadcast: {} ({} failed)", stats.frames_sent, stats.frames_failed);
    info!("  - Captures: {} | Eliminations: {}", stats.captures, stats.eliminations);
}
