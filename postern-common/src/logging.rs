use std::{fs::OpenOptions, str::FromStr, sync::Mutex};

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

use crate::{config::LoggingConfig, error::LoggingError};

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg),*)
    }};
}

#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "outgoing", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::outgoing!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "incoming", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::incoming!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

const fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

/// Pick the level filter: configured value first, then `LOG_LEVEL`, then the
/// build default. An unparseable value falls back to the default.
fn resolve_level(configured: Option<&str>, environment: Option<&str>) -> LevelFilter {
    let default = default_level();

    configured.or(environment).map_or(default, |level| {
        LevelFilter::from_str(level).unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    })
}

/// Install the global diagnostic subscriber.
///
/// Only events from `postern*` targets are emitted. Output is appended to the
/// configured file, or written to stderr when none is configured.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let environment = std::env::var("LOG_LEVEL").ok();
    let level = resolve_level(config.level.as_deref(), environment.as_deref());

    let file = config
        .file
        .as_ref()
        .map(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::Open {
                    path: path.clone(),
                    source,
                })
        })
        .transpose()?;

    let to_file = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
    });

    let to_stderr = to_file.is_none().then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
    });

    tracing_subscriber::Registry::default()
        .with(
            Layer::and_then(to_file, to_stderr)
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("postern")
                })),
        )
        .try_init()?;

    Ok(())
}
