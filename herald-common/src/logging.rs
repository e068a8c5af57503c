//! Logging initialisation and the structured log macros.
//!
//! Verbosity comes from the `LOG_LEVEL` environment variable; debug builds
//! default to TRACE, release builds to INFO. Only events targeting `herald`
//! pass the filter, so library dependencies stay quiet unless explicitly
//! re-enabled.

use chrono::Utc;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, fmt::time::FormatTime,
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Microsecond epoch timestamps keep log lines machine-sortable.
struct Time;

impl FormatTime for Time {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let time = Utc::now();
        w.write_fmt(format_args!("{:?}", time.timestamp_micros()))
    }
}

/// Emit an event inside a named span, targeting `herald`.
#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!(target: "herald", $level, $span);
        let _enter = span.enter();

        $crate::tracing::event!(target: "herald", $level, $($msg),*)
    }};
}

/// Operator-facing lifecycle messages (start, stop, configuration), kept
/// distinguishable from per-message tracing by the "internal" span.
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

fn level_from_env() -> LevelFilter {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        match level.to_ascii_lowercase().as_str() {
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            "off" => LevelFilter::OFF,
            _ => LevelFilter::ERROR,
        }
    } else if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

pub fn init() {
    tracing_subscriber::Registry::default()
        .with(
            (if cfg!(debug_assertions) {
                tracing_subscriber::fmt::layer()
            } else {
                tracing_subscriber::fmt::layer()
                    .with_file(false)
                    .with_line_number(false)
            })
            .compact()
            .with_ansi(true)
            .with_timer(Time)
            .with_target(false)
            .with_level(false)
            .with_filter(level_from_env())
            .with_filter(FilterFn::new(|metadata| {
                metadata.target().starts_with("herald")
            })),
        )
        .init();
}
