//! Tracing subscriber setup

use crate::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. Request traces from tower-http stay
/// visible outside prod; sqlx statement logging is kept to warnings.
fn default_directives(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "producechain_backend=debug,tower_http=debug,sqlx=warn,info",
        Environment::Staging => "producechain_backend=debug,tower_http=info,sqlx=warn,info",
        Environment::Prod => "producechain_backend=info,tower_http=info,sqlx=warn,warn",
    }
}

pub fn init_logging(env: &Environment) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives(env).into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    // JSON in production for the log shipper, pretty output elsewhere
    if env.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .init();
    }

    tracing::info!(environment = ?env, "Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse_for_every_environment() {
        for env in [Environment::Dev, Environment::Staging, Environment::Prod] {
            let directives = default_directives(&env);
            assert!(EnvFilter::try_new(directives).is_ok(), "{directives}");
            assert!(directives.contains("producechain_backend="));
        }
    }

    #[test]
    fn prod_keeps_crate_logs_at_info() {
        assert!(default_directives(&Environment::Prod).starts_with("producechain_backend=info"));
        assert!(default_directives(&Environment::Dev).contains("producechain_backend=debug"));
    }
}
