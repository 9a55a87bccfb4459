//! The exporter: a fixed-interval scheduler loop around a connect/format/
//! send/disconnect export cycle.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{ExporterConfig, WriteErrorPolicy};
use crate::format::{format_metric, render_tags, LineContext};
use crate::hostname::resolve_short_hostname;
use crate::registry::Registry;

/// Errors that can abort an export cycle.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Could not establish the collector connection. No data was sent.
    #[error("failed to connect to collector at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Connection attempt exceeded the configured timeout. No data was sent.
    #[error("connection to collector at {addr} timed out")]
    ConnectTimeout { addr: String },

    /// A write on the collector socket failed and the write error policy is
    /// [`WriteErrorPolicy::Abort`].
    #[error("failed to write to collector: {0}")]
    Write(#[source] std::io::Error),
}

/// Periodically flushes a metrics registry to an OpenTSDB collector.
///
/// The exporter reads the registry through the [`Registry`] trait and never
/// mutates metric state. Each cycle opens its own short-lived TCP connection;
/// nothing is pooled or reused across cycles except the memoized short
/// hostname.
pub struct Exporter {
    config: ExporterConfig,
    registry: Arc<dyn Registry>,
    hostname: OnceLock<String>,
}

impl Exporter {
    /// Create an exporter over the given registry.
    pub fn new(config: ExporterConfig, registry: Arc<dyn Registry>) -> Self {
        Self {
            config,
            registry,
            hostname: OnceLock::new(),
        }
    }

    /// Pin the hostname reported in every line instead of resolving it from
    /// the OS on first use.
    pub fn with_hostname(self, host: impl Into<String>) -> Self {
        let _ = self.hostname.set(host.into());
        self
    }

    /// The short hostname reported on every line, resolved once and cached
    /// for the exporter's lifetime.
    pub fn short_hostname(&self) -> &str {
        self.hostname.get_or_init(resolve_short_hostname)
    }

    /// Drive export cycles at the configured flush interval until `shutdown`
    /// is cancelled.
    ///
    /// The first cycle fires one full interval after this call. Cycle errors
    /// are logged and never interrupt the loop. A cycle that overruns the
    /// interval is not compensated for: missed ticks are skipped, not queued,
    /// and cycles never overlap. On cancellation the loop exits between
    /// cycles and returns to the caller.
    pub async fn run(&self, shutdown: CancellationToken) {
        let period = self.config.flush_interval;
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            addr = %self.config.addr(),
            interval = ?period,
            "OpenTSDB exporter started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("OpenTSDB exporter shutdown requested");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.export_once().await {
                        tracing::warn!(error = %e, "Export cycle failed");
                    }
                }
            }
        }

        tracing::info!("OpenTSDB exporter stopped");
    }

    /// Perform one complete flush: connect, format every registered metric,
    /// send, disconnect.
    ///
    /// All lines of one cycle share a single wall-clock timestamp and one
    /// rendered tag string. A connection failure aborts the cycle before any
    /// data is sent; mid-cycle write failures follow the configured
    /// [`WriteErrorPolicy`]. The connection is closed when the cycle ends,
    /// whether it succeeded or not.
    pub async fn export_once(&self) -> Result<(), ExportError> {
        let addr = self.config.addr();
        let timestamp = Utc::now().timestamp();
        let tags = render_tags(&self.config.tags);
        let ctx = LineContext {
            prefix: &self.config.prefix,
            timestamp,
            hostname: self.short_hostname(),
            tags: &tags,
        };
        let duration_unit_ns = self.config.duration_unit.as_nanos().min(i64::MAX as u128) as i64;

        let connect = TcpStream::connect(&addr);
        let stream = match time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ExportError::Connect { addr, source }),
            Err(_) => return Err(ExportError::ConnectTimeout { addr }),
        };
        let mut writer = BufWriter::new(stream);

        // Registry iteration is a synchronous callback, so each metric is
        // formatted into its own block up front and the blocks are written
        // afterwards. The per-metric block boundary is what the flush policy
        // below operates on.
        let mut blocks: Vec<String> = Vec::new();
        self.registry.each(&mut |name, metric| {
            let mut block = String::new();
            format_metric(&mut block, &ctx, name, metric, duration_unit_ns);
            if !block.is_empty() {
                blocks.push(block);
            }
        });

        // Write-through on every metric: more syscalls than one flush per
        // cycle, but a mid-cycle failure loses at most the current block.
        for block in &blocks {
            let result = async {
                writer.write_all(block.as_bytes()).await?;
                writer.flush().await
            }
            .await;

            if let Err(e) = result {
                match self.config.write_errors {
                    WriteErrorPolicy::Abort => return Err(ExportError::Write(e)),
                    WriteErrorPolicy::BestEffort => {
                        tracing::debug!(error = %e, "Write to collector failed, continuing");
                    }
                }
            }
        }

        // Dropping the writer closes the connection.
        Ok(())
    }
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("config", &self.config)
            .field("hostname", &self.hostname.get())
            .finish_non_exhaustive()
    }
}
