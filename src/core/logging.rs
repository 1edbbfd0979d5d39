//! `tracing` wiring: console output plus the rotating audit log.
//!
//! Every event goes to stderr and, formatted as
//! `<YYYY-MM-DD HH:MM:SS,mmm> <LEVEL>: <message>`, to the rotating log file.

use crate::core::rotating_log::RotatingLog;
use crate::core::time::now_log_stamp;
use std::io;
use std::sync::Arc;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive; wins over config.
pub const LOG_ENV: &str = "PLAYDECK_LOG";

/// Single-line event format for the rotating log.
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        write!(writer, "{} {}: ", now_log_stamp(), event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `MakeWriter` that hands each formatted event to a [`RotatingLog`].
#[derive(Clone)]
pub struct RotatingLogSink {
    log: Arc<RotatingLog>,
}

impl RotatingLogSink {
    pub fn new(log: Arc<RotatingLog>) -> Self {
        Self { log }
    }
}

/// Buffers one event and emits it on drop.
pub struct SinkWriter {
    log: Arc<RotatingLog>,
    buf: Vec<u8>,
}

impl<'a> MakeWriter<'a> for RotatingLogSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            log: Arc::clone(&self.log),
            buf: Vec::new(),
        }
    }
}

impl io::Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SinkWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.buf);
        self.log.emit(text.trim_end_matches(['\r', '\n']));
    }
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(log: Arc<RotatingLog>, default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(LineFormat)
                .with_writer(RotatingLogSink::new(log)),
        )
        .try_init()
        .is_ok()
}
