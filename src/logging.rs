//! Tracing subscriber setup

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber honouring `RUST_LOG`
///
/// Falls back to `default_level` when `RUST_LOG` is unset. Returns `false`
/// if a global subscriber was already installed.
pub fn init_tracing(default_level: Level) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
