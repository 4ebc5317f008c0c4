//! Structured logging setup shared by the server, `simulate` and
//! `featurize`.
//!
//! `RUST_LOG` wins when set. Otherwise `AXUM_LOG_LEVEL` picks the crate
//! level (default `debug`) and the chatty dependencies are held back:
//! sqlx statement logs at `warn`, hyper and reqwest at `info`.
//! `AXUM_SPAN_EVENTS` is `full`, `enter_exit` or unset (close events only).
//! `FORCE_COLOR` overrides TTY detection.

use std::env;

use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

const QUIET_DEPENDENCIES: &str = "sqlx::query=warn,hyper=info,reqwest=info";

/// Install the global subscriber. Call once, first thing in `main`.
pub fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = env::var("FORCE_COLOR")
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or_else(|| std::io::stdout().is_terminal());

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = env::var("AXUM_LOG_LEVEL").unwrap_or_default();
        EnvFilter::new(default_directives(&level))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}

/// Filter directives for a requested level; unknown levels fall back to
/// `debug`.
fn default_directives(level: &str) -> String {
    // ---
    let level = match level {
        "trace" | "debug" | "info" | "warn" | "error" => level,
        _ => "debug",
    };
    format!("{level},{QUIET_DEPENDENCIES}")
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
