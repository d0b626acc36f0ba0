//! Tracing setup for the binary.
//!
//! Events go to stderr from process start. The rotating log file only exists once the
//! config is known, so it sits behind a reload layer that starts empty and is filled in by
//! [`attach_log_file`].

use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};

use anyhow::{Context as _, Result};
use sftp_poller_core::config::PollerConfig;
use sftp_poller_core::log_rotation::LogRotator;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt as fmt_layer, reload, EnvFilter, Layer, Registry};

pub type FileLayerHandle = reload::Handle<Option<RotatingFileLayer>, Registry>;

/// Writes every event through a shared [`LogRotator`].
///
/// The rotator must never log through `tracing` itself: it runs under this layer's lock.
#[derive(Clone)]
pub struct RotatingFileLayer {
    rotator: Arc<Mutex<LogRotator>>,
}

impl RotatingFileLayer {
    pub fn new(rotator: LogRotator) -> Self {
        Self {
            rotator: Arc::new(Mutex::new(rotator)),
        }
    }
}

impl<S: Subscriber> Layer<S> for RotatingFileLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut line = LineVisitor::default();
        event.record(&mut line);
        let level = *event.metadata().level();
        if let Ok(mut rotator) = self.rotator.lock() {
            // A failed write to the log file has nowhere to be reported.
            let _ = rotator.append(&line.finish(), level);
        }
    }
}

/// Renders `message key=value key=value` on one line.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Installs the global subscriber: env filter (default `info`), stderr output, and an
/// empty slot for the log file.
pub fn init() -> Result<FileLayerHandle> {
    let (file_layer, handle) = reload::Layer::new(None::<RotatingFileLayer>);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(filter)
        .with(fmt_layer::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(handle)
}

/// Starts mirroring events into the configured rotating log file.
pub fn attach_log_file(handle: &FileLayerHandle, config: &PollerConfig) -> Result<()> {
    let rotator = LogRotator::new(
        config.log_file.clone(),
        config.log_file_size_limit_bytes(),
        config.max_log_archives,
    );
    handle
        .reload(Some(RotatingFileLayer::new(rotator)))
        .context("Failed to attach log file layer")?;
    tracing::info!(log_file = %config.log_file.display(), "[LOG] Log file attached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sftp_poller_core::log_rotation::LOG_CREATED_MARKER;
    use tempfile::tempdir;

    #[test]
    fn events_land_in_the_log_file_with_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.log");
        let layer = RotatingFileLayer::new(LogRotator::new(&path, 1024 * 1024, 3));
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(file = "a.csv", attempt = 2, "[XFER] Transfer attempt failed");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(LOG_CREATED_MARKER));
        assert!(
            lines[1].ends_with("[WARN] [XFER] Transfer attempt failed file=a.csv attempt=2"),
            "got {}",
            lines[1]
        );
    }
}
