//! Log sink setup.
//!
//! Events go through `tracing`. With a positive `queue_size` lines are handed
//! to a background writer thread over a bounded buffer that drops lines when
//! full instead of blocking the caller; `queue_size == 0` writes inline.

use anyhow::Context;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::LogConfig;

const LOG_FILE_PREFIX: &str = "staticd.log";

/// Installs the global subscriber.
///
/// The returned guard flushes the background writer when dropped and must be
/// held for as long as the process logs.
pub fn init(cfg: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    if !cfg.enabled {
        return Ok(None);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .with_context(|| format!("invalid log level {:?}", cfg.level))?;

    let (writer, guard) = match (&cfg.dir, cfg.queue_size) {
        (Some(dir), 0) => (
            BoxMakeWriter::new(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX)),
            None,
        ),
        (Some(dir), limit) => {
            let (w, guard) = NonBlockingBuilder::default()
                .lossy(true)
                .buffered_lines_limit(limit)
                .finish(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));
            (BoxMakeWriter::new(w), Some(guard))
        }
        (None, 0) => (BoxMakeWriter::new(std::io::stdout), None),
        (None, limit) => {
            let (w, guard) = NonBlockingBuilder::default()
                .lossy(true)
                .buffered_lines_limit(limit)
                .finish(std::io::stdout());
            (BoxMakeWriter::new(w), Some(guard))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .with_level(true)
        .with_ansi(cfg.dir.is_none())
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))?;

    Ok(guard)
}
