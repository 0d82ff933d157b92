//! Tracing subscriber setup for the session binary.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;

/// Filter directives used when `RUST_LOG` is unset.
fn default_directives(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "inspection_analysis=debug,analysis_session=debug,reqwest=info,info",
        Environment::Staging => "inspection_analysis=debug,analysis_session=info,info",
        Environment::Prod => "inspection_analysis=info,analysis_session=info,warn",
    }
}

/// Install the global subscriber: JSON lines in prod, pretty output elsewhere.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(env: &Environment) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    let registry = tracing_subscriber::registry().with(filter);
    if env.is_prod() {
        registry.with(fmt_layer.json()).try_init()?;
    } else {
        registry.with(fmt_layer.pretty()).try_init()?;
    }

    tracing::info!(env = ?env, "Logging initialized");
    Ok(())
}
