//! Logging setup for the native viewer

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global `tracing` subscriber
///
/// If `RUST_LOG` is not set, a default that keeps the engine's lifecycle logs and silences
/// the windowing noise is used.
pub fn init() {
    let defaulted = std::env::var("RUST_LOG").is_err();
    if defaulted {
        // Safety: single-threaded at startup
        unsafe {
            if cfg!(debug_assertions) {
                std::env::set_var(
                    "RUST_LOG",
                    "debug,eframe::native=warn,egui::context=warn,hyper_util=info,walkers=info,reqwest::connect=info",
                );
            } else {
                std::env::set_var(
                    "RUST_LOG",
                    "info,eframe::native=warn,egui::context=warn",
                );
            }
        }
    }

    let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());
    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        return;
    }

    if defaulted {
        tracing::info!(
            "RUST_LOG set to default: {}",
            std::env::var("RUST_LOG").unwrap_or_default()
        );
    }
}
