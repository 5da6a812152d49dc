pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

use tracing_subscriber::EnvFilter;

fn subscriber(fallback: &str) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .finish()
}

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over `debug`.
pub fn init_tracing(debug: bool) {
    let _ = tracing::subscriber::set_global_default(subscriber(if debug { "debug" } else { "info" }));
}

/// Runs `f` under a temporary `info` subscriber, for work that happens
/// before the configured level is known (config discovery and loading).
pub fn with_startup_tracing<T>(f: impl FnOnce() -> T) -> T {
    tracing::subscriber::with_default(subscriber("info"), f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_events_reach_a_subscriber() {
        let installed = with_startup_tracing(|| {
            tracing::dispatcher::get_default(|d| !d.is::<tracing::subscriber::NoSubscriber>())
        });
        assert!(installed);
    }
}
