// # portpusherd - Port Pusher Daemon
//
// The portpusherd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Registering the port source and the compiled-in backends
// 3. Building the push engine
// 4. Running it until SIGINT/SIGTERM
//
// All push logic lives in portpusher-core and the backend crates.
//
// ## Configuration
//
// ### General
// - `PUSHER_LOG_LEVEL`: DEBUG, INFO, WARN or ERROR (default INFO)
// - `PUSHER_DELAY_SUCCESS`: Minutes between iterations after a clean run (default 10)
// - `PUSHER_DELAY_ERROR`: Minutes until the next attempt after any failure (default 5)
//
// ### Gluetun
// - `GLUETUN_HOST` (default localhost), `GLUETUN_PORT` (default 8000)
//
// ### Backends
// For each of `TRANSMISSION`, `QBITTORRENT` and `DELUGE`:
// - `<NAME>_ENABLED`: `true` to push to this client
// - `<NAME>_HOST`, `<NAME>_PORT`, `<NAME>_USER`, `<NAME>_PASS`
//
// ## Example
//
// ```bash
// export GLUETUN_HOST=gluetun
// export QBITTORRENT_ENABLED=true
// export QBITTORRENT_PASS=changeme
//
// portpusherd
// ```

mod env;

use anyhow::Result;
use env::Config;
use portpusher_core::{BackendRegistry, PushEngine};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum PusherExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<PusherExitCode> for ExitCode {
    fn from(code: PusherExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return PusherExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return PusherExitCode::ConfigError.into();
    }

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PusherExitCode::ConfigError.into();
    }

    info!("Starting portpusherd daemon");
    info!(
        "Gluetun at {}, {} backend(s) configured",
        config.pusher.source.base_url(),
        config.pusher.backends.len()
    );

    let engine = match build_engine(&config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Startup error: {}", e);
            return PusherExitCode::ConfigError.into();
        }
    };

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PusherExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = engine.run().await {
            error!("Daemon error: {}", e);
            PusherExitCode::RuntimeError
        } else {
            info!("Shutting down daemon");
            PusherExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Register every compiled-in component
fn registry() -> BackendRegistry {
    let registry = BackendRegistry::new();

    portpusher_source_gluetun::register(&registry);

    #[cfg(feature = "transmission")]
    portpusher_backend_transmission::register(&registry);

    #[cfg(feature = "qbittorrent")]
    portpusher_backend_qbittorrent::register(&registry);

    #[cfg(feature = "deluge")]
    portpusher_backend_deluge::register(&registry);

    registry
}

/// Create the source, the backends and the engine from configuration
///
/// All components share one cookie-enabled HTTP client.
fn build_engine(config: &Config) -> Result<PushEngine> {
    let registry = registry();
    let client = portpusher_core::transport::client()?;

    let source = registry.create_source(
        portpusher_source_gluetun::SOURCE_NAME,
        &config.pusher.source,
        client.clone(),
    )?;
    let pushers = registry.create_pushers(&config.pusher.backends, &client)?;

    for backend in &config.pusher.backends {
        info!("Client ready {} at {}", backend.kind, backend.base_url());
    }

    let (engine, events) = PushEngine::new(source, pushers, config.pusher.engine.clone())?;

    // Progress is reported through tracing; nothing consumes engine events here
    drop(events);

    Ok(engine)
}
