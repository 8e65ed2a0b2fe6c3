//! Statistics tracking for the relay.
//!
//! Counters for every way a datagram can leave the pipeline, plus
//! breakdowns of relayed contacts by dialect, band and mode, and
//! distributions of payload size and processing latency.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::contact::{ContactRecord, Dialect};

/// Thread-safe statistics collector shared by the receive loop and workers.
#[derive(Debug)]
pub struct RelayStats {
    /// Datagrams read from the listen socket
    pub datagrams_received: AtomicU64,

    /// Payload bytes read from the listen socket
    pub bytes_received: AtomicU64,

    /// Datagrams dropped by the source filter
    pub source_rejected: AtomicU64,

    /// Datagrams dropped because every worker was busy
    pub overloaded: AtomicU64,

    /// Datagrams no callsign could be extracted from
    pub parse_failures: AtomicU64,

    /// Records that could not be rendered as XML
    pub serialize_failures: AtomicU64,

    /// Outbound sends that failed
    pub send_failures: AtomicU64,

    /// Contacts delivered to the target
    pub relayed: AtomicU64,

    /// Histogram of inbound payload sizes
    size_histogram: RwLock<Histogram<u64>>,

    /// Histogram of receive-to-send latency in microseconds
    latency_histogram: RwLock<Histogram<u64>>,

    relayed_by_dialect: RwLock<HashMap<Dialect, u64>>,

    relayed_by_band: RwLock<HashMap<String, u64>>,

    relayed_by_mode: RwLock<HashMap<String, u64>>,

    parse_failures_by_dialect: RwLock<HashMap<Dialect, u64>>,

    /// When stats collection started
    start_time: Instant,
}

impl RelayStats {
    /// Create a new statistics collector.
    pub fn new() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            source_rejected: AtomicU64::new(0),
            overloaded: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            serialize_failures: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            relayed: AtomicU64::new(0),
            // Size histogram: 1 byte up to a maximal UDP payload
            size_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 65_536, 3).expect("Failed to create size histogram"),
            ),
            // Latency histogram: 1µs to 10s
            latency_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 10_000_000, 3)
                    .expect("Failed to create latency histogram"),
            ),
            relayed_by_dialect: RwLock::new(HashMap::new()),
            relayed_by_band: RwLock::new(HashMap::new()),
            relayed_by_mode: RwLock::new(HashMap::new()),
            parse_failures_by_dialect: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a datagram read from the listen socket.
    pub fn record_datagram(&self, bytes: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);

        if let Ok(mut hist) = self.size_histogram.write() {
            let _ = hist.record((bytes as u64).max(1));
        }
    }

    /// Record a datagram dropped by the source filter.
    pub fn record_source_rejected(&self) {
        self.source_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a datagram dropped because the worker pool was saturated.
    pub fn record_overloaded(&self) {
        self.overloaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a parse failure for the given dialect.
    pub fn record_parse_failure(&self, dialect: Dialect) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut map) = self.parse_failures_by_dialect.write() {
            *map.entry(dialect).or_insert(0) += 1;
        }
    }

    /// Record a serialization failure.
    pub fn record_serialize_failure(&self) {
        self.serialize_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed outbound send.
    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a contact delivered to the target.
    pub fn record_relayed(&self, dialect: Dialect, record: &ContactRecord, latency: Duration) {
        self.relayed.fetch_add(1, Ordering::Relaxed);

        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        if let Ok(mut hist) = self.latency_histogram.write() {
            let _ = hist.record(micros.clamp(1, 10_000_000));
        }

        if let Ok(mut map) = self.relayed_by_dialect.write() {
            *map.entry(dialect).or_insert(0) += 1;
        }

        if let Some(band) = record.band.as_deref()
            && let Ok(mut map) = self.relayed_by_band.write()
        {
            *map.entry(band.to_string()).or_insert(0) += 1;
        }

        if let Some(mode) = record.mode.as_deref()
            && let Ok(mut map) = self.relayed_by_mode.write()
        {
            *map.entry(mode.to_string()).or_insert(0) += 1;
        }
    }

    /// Get the elapsed time since stats collection started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get the current relay rate.
    pub fn relayed_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.relayed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Generate a summary report.
    pub fn summary(&self) -> RelaySummary {
        let percentiles = |hist: &RwLock<Histogram<u64>>| {
            hist.read()
                .ok()
                .filter(|h| !h.is_empty())
                .map(|h| HistogramPercentiles {
                    p50: h.value_at_quantile(0.50),
                    p90: h.value_at_quantile(0.90),
                    p99: h.value_at_quantile(0.99),
                    min: h.min(),
                    max: h.max(),
                    mean: h.mean(),
                })
        };

        let by_dialect = |map: &RwLock<HashMap<Dialect, u64>>| -> HashMap<String, u64> {
            map.read()
                .map(|m| m.iter().map(|(k, v)| (k.to_string(), *v)).collect())
                .unwrap_or_default()
        };

        let relayed_by_band = self
            .relayed_by_band
            .read()
            .map(|m| m.clone())
            .unwrap_or_default();

        let relayed_by_mode = self
            .relayed_by_mode
            .read()
            .map(|m| m.clone())
            .unwrap_or_default();

        RelaySummary {
            elapsed_secs: self.elapsed().as_secs_f64(),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            source_rejected: self.source_rejected.load(Ordering::Relaxed),
            overloaded: self.overloaded.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            serialize_failures: self.serialize_failures.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            relayed: self.relayed.load(Ordering::Relaxed),
            relayed_per_second: self.relayed_per_second(),
            size_percentiles: percentiles(&self.size_histogram),
            latency_percentiles: percentiles(&self.latency_histogram),
            relayed_by_dialect: by_dialect(&self.relayed_by_dialect),
            relayed_by_band,
            relayed_by_mode,
            parse_failures_by_dialect: by_dialect(&self.parse_failures_by_dialect),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile values from a histogram.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramPercentiles {
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// Point-in-time snapshot of [`RelayStats`].
#[derive(Debug, Clone, Serialize)]
pub struct RelaySummary {
    pub elapsed_secs: f64,
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub source_rejected: u64,
    pub overloaded: u64,
    pub parse_failures: u64,
    pub serialize_failures: u64,
    pub send_failures: u64,
    pub relayed: u64,
    pub relayed_per_second: f64,
    pub size_percentiles: Option<HistogramPercentiles>,
    pub latency_percentiles: Option<HistogramPercentiles>,
    pub relayed_by_dialect: HashMap<String, u64>,
    pub relayed_by_band: HashMap<String, u64>,
    pub relayed_by_mode: HashMap<String, u64>,
    pub parse_failures_by_dialect: HashMap<String, u64>,
}

impl RelaySummary {
    /// Datagrams dropped for any reason.
    pub fn dropped(&self) -> u64 {
        self.source_rejected
            + self.overloaded
            + self.parse_failures
            + self.serialize_failures
            + self.send_failures
    }
}

fn write_breakdown(
    f: &mut std::fmt::Formatter<'_>,
    title: &str,
    counts: &HashMap<String, u64>,
) -> std::fmt::Result {
    if counts.is_empty() {
        return Ok(());
    }
    writeln!(f, "{}:", title)?;
    let mut entries: Vec<_> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (name, count) in entries {
        writeln!(f, "  {}: {}", name, count)?;
    }
    writeln!(f)
}

impl std::fmt::Display for RelaySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f, "                UDP LOGGER RELAY STATISTICS")?;
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Runtime: {:.1}s", self.elapsed_secs)?;
        writeln!(f, "Datagrams received: {}", self.datagrams_received)?;
        writeln!(f, "Bytes received: {} KB", self.bytes_received / 1024)?;
        writeln!(
            f,
            "Relayed: {} ({:.1}%)",
            self.relayed,
            if self.datagrams_received > 0 {
                self.relayed as f64 / self.datagrams_received as f64 * 100.0
            } else {
                0.0
            }
        )?;
        writeln!(f, "Rate: {:.2} contacts/sec", self.relayed_per_second)?;
        writeln!(f)?;

        writeln!(f, "Dropped: {}", self.dropped())?;
        writeln!(f, "  Source rejected: {}", self.source_rejected)?;
        writeln!(f, "  Overloaded: {}", self.overloaded)?;
        writeln!(f, "  Parse failures: {}", self.parse_failures)?;
        writeln!(f, "  Serialize failures: {}", self.serialize_failures)?;
        writeln!(f, "  Send failures: {}", self.send_failures)?;
        writeln!(f)?;

        if let Some(ref p) = self.size_percentiles {
            writeln!(f, "Payload Size (bytes):")?;
            writeln!(f, "  Min: {}, Max: {}, Mean: {:.1}", p.min, p.max, p.mean)?;
            writeln!(f, "  P50: {}, P90: {}, P99: {}", p.p50, p.p90, p.p99)?;
            writeln!(f)?;
        }

        if let Some(ref p) = self.latency_percentiles {
            writeln!(f, "Processing Latency (µs):")?;
            writeln!(f, "  Min: {}, Max: {}, Mean: {:.1}", p.min, p.max, p.mean)?;
            writeln!(f, "  P50: {}, P90: {}, P99: {}", p.p50, p.p90, p.p99)?;
            writeln!(f)?;
        }

        write_breakdown(f, "Relayed by Dialect", &self.relayed_by_dialect)?;
        write_breakdown(f, "Relayed by Band", &self.relayed_by_band)?;
        write_breakdown(f, "Relayed by Mode", &self.relayed_by_mode)?;
        write_breakdown(f, "Parse Failures by Dialect", &self.parse_failures_by_dialect)?;

        Ok(())
    }
}
