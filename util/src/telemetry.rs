//! # Telemetry
//!
//! A single write-only sink for controller telemetry. Components hold a
//! [`Telemetry`] handle which carries a hierarchical key prefix, keys are
//! joined with `/`. Values are produced lazily so that values filtered out by
//! the current [`Level`] cost nothing to compute.
//!
//! Telemetry is separate from the diagnostic `log` output: it is a stream of
//! named numbers meant for plotting, not messages meant for reading.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

// Internal imports
use crate::archive::{ArchiveError, Archiver};
use crate::logger::TELEMETRY_TARGET;
use crate::session;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of records the CSV writer thread buffers before flushing.
const CSV_FLUSH_INTERVAL: usize = 256;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Telemetry verbosity. A value is emitted if its level is less than or equal
/// to the telemetry's current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Values needed during competition, always emitted.
    Comp,

    /// Values useful when debugging behaviour.
    Debug,

    /// Everything.
    Trace,
}

/// A single telemetry value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    F64(f64),
    Bool(bool),
    Str(String),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Destination for telemetry values.
///
/// Implementations must not block the caller for any meaningful time, they
/// are called from inside the control loop.
pub trait TelemetrySink: Send + Sync {
    /// Write a single value under the given fully qualified key.
    fn write(&self, key: &str, value: Value);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Handle to the telemetry sink, scoped to a key prefix.
#[derive(Clone)]
pub struct Telemetry {
    root: Arc<Root>,
    prefix: String,
}

struct Root {
    level: AtomicU8,
    sink: Box<dyn TelemetrySink>,
}

/// Sink forwarding every value to the `log` facade at trace level, under the
/// telemetry target.
pub struct LogSink;

/// Sink retaining the latest value of each key, used for inspection in tests.
#[derive(Default)]
pub struct MemorySink {
    values: Mutex<HashMap<String, Value>>,
}

/// Sink archiving every value into a CSV file from a background thread.
pub struct CsvSink {
    sender: Mutex<Option<Sender<CsvRecord>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Serialize)]
struct CsvRecord {
    time_s: f64,
    key: String,
    value: String,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Level {
    fn to_u8(self) -> u8 {
        match self {
            Level::Comp => 0,
            Level::Debug => 1,
            Level::Trace => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Level::Comp,
            1 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::F64(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
        }
    }
}

impl Telemetry {
    /// Create a new root telemetry handle writing into the given sink.
    pub fn new<S: TelemetrySink + 'static>(level: Level, sink: S) -> Self {
        Self {
            root: Arc::new(Root {
                level: AtomicU8::new(level.to_u8()),
                sink: Box::new(sink),
            }),
            prefix: String::new(),
        }
    }

    /// Telemetry which emits nothing, for tests and tools.
    pub fn disabled() -> Self {
        Self::new(Level::Comp, NullSink)
    }

    /// Create a child handle whose keys are nested under `name`.
    pub fn child(&self, name: &str) -> Self {
        Self {
            root: self.root.clone(),
            prefix: self.key(name),
        }
    }

    /// Change the level of the whole telemetry tree.
    pub fn set_level(&self, level: Level) {
        self.root.level.store(level.to_u8(), Ordering::Relaxed);
    }

    /// Get the current level of the telemetry tree.
    pub fn level(&self) -> Level {
        Level::from_u8(self.root.level.load(Ordering::Relaxed))
    }

    /// True if values at the given level will be emitted.
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level()
    }

    /// Log a float.
    pub fn log_f64<F: FnOnce() -> f64>(&self, level: Level, key: &str, value: F) {
        if self.enabled(level) {
            self.root.sink.write(&self.key(key), Value::F64(value()));
        }
    }

    /// Log a bool.
    pub fn log_bool<F: FnOnce() -> bool>(&self, level: Level, key: &str, value: F) {
        if self.enabled(level) {
            self.root.sink.write(&self.key(key), Value::Bool(value()));
        }
    }

    /// Log a string.
    pub fn log_str<F: FnOnce() -> String>(&self, level: Level, key: &str, value: F) {
        if self.enabled(level) {
            self.root.sink.write(&self.key(key), Value::Str(value()));
        }
    }

    /// Log any serialisable value, flattening structs, maps and sequences
    /// into one key per leaf. Missing optional values are skipped.
    pub fn log_serialize<T, F>(&self, level: Level, key: &str, value: F)
    where
        T: Serialize,
        F: FnOnce() -> T,
    {
        if !self.enabled(level) {
            return;
        }

        match serde_json::to_value(value()) {
            Ok(v) => self.write_json(&self.key(key), v),
            Err(e) => warn!("Cannot serialise telemetry for {}: {}", self.key(key), e),
        }
    }

    fn write_json(&self, key: &str, value: serde_json::Value) {
        use serde_json::Value as J;

        match value {
            J::Null => (),
            J::Bool(b) => self.root.sink.write(key, Value::Bool(b)),
            J::Number(n) => {
                if let Some(f) = n.as_f64() {
                    self.root.sink.write(key, Value::F64(f))
                }
            }
            J::String(s) => self.root.sink.write(key, Value::Str(s)),
            J::Array(a) => {
                for (i, v) in a.into_iter().enumerate() {
                    self.write_json(&format!("{}/{}", key, i), v);
                }
            }
            J::Object(o) => {
                for (k, v) in o.into_iter() {
                    self.write_json(&format!("{}/{}", key, k), v);
                }
            }
        }
    }

    fn key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("prefix", &self.prefix)
            .field("level", &self.level())
            .finish()
    }
}

struct NullSink;

impl TelemetrySink for NullSink {
    fn write(&self, _key: &str, _value: Value) {}
}

impl TelemetrySink for LogSink {
    fn write(&self, key: &str, value: Value) {
        trace!(target: TELEMETRY_TARGET, "{} = {}", key, value);
    }
}

impl MemorySink {
    /// Get the latest value written under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().ok()?.get(key).cloned()
    }

    /// Get the latest float written under `key`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(Value::F64(v)) => Some(v),
            _ => None,
        }
    }

    /// Number of distinct keys written so far.
    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TelemetrySink for MemorySink {
    fn write(&self, key: &str, value: Value) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value);
        }
    }
}

impl<S: TelemetrySink> TelemetrySink for Arc<S> {
    fn write(&self, key: &str, value: Value) {
        self.as_ref().write(key, value)
    }
}

impl CsvSink {
    /// Create a sink archiving into the given CSV file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let mut archiver = Archiver::from_file_path(path)?;
        let (tx, rx) = channel::<CsvRecord>();

        let writer = thread::spawn(move || {
            let mut num_pending = 0usize;

            for record in rx {
                if let Err(e) = archiver.serialise(record) {
                    warn!("Telemetry archive write failed: {}", e);
                }

                num_pending += 1;
                if num_pending >= CSV_FLUSH_INTERVAL {
                    if let Err(e) = archiver.flush() {
                        warn!("Telemetry archive flush failed: {}", e);
                    }
                    num_pending = 0;
                }
            }

            if let Err(e) = archiver.flush() {
                warn!("Telemetry archive flush failed: {}", e);
            }
        });

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Close the sink, waiting for all buffered records to reach the disk.
    pub fn close(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }

        let handle = match self.writer.lock() {
            Ok(mut w) => w.take(),
            Err(_) => None,
        };

        if let Some(h) = handle {
            if h.join().is_err() {
                warn!("Telemetry archive thread panicked");
            }
        }
    }
}

impl TelemetrySink for CsvSink {
    fn write(&self, key: &str, value: Value) {
        let sender = match self.sender.lock() {
            Ok(s) => s,
            Err(_) => return,
        };

        if let Some(ref tx) = *sender {
            // The writer only goes away on close, after which values are dropped
            let _ = tx.send(CsvRecord {
                time_s: session::get_elapsed_seconds(),
                key: key.to_string(),
                value: value.to_string(),
            });
        }
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Speeds {
        vx_ms: f64,
        vy_ms: f64,
        angle_rad: Option<f64>,
    }

    #[test]
    fn test_hierarchical_keys() {
        let sink = Arc::new(MemorySink::default());
        let telem = Telemetry::new(Level::Trace, sink.clone());
        let child = telem.child("drive").child("module_0");

        child.log_f64(Level::Comp, "speed", || 1.5);
        assert_eq!(sink.get_f64("drive/module_0/speed"), Some(1.5));
    }

    #[test]
    fn test_level_filter() {
        let sink = Arc::new(MemorySink::default());
        let telem = Telemetry::new(Level::Debug, sink.clone());

        let mut evaluated = false;
        telem.log_f64(Level::Trace, "hidden", || {
            evaluated = true;
            1.0
        });
        assert!(!evaluated);
        assert!(sink.get("hidden").is_none());

        telem.log_bool(Level::Debug, "shown", || true);
        assert_eq!(sink.get("shown"), Some(Value::Bool(true)));

        telem.set_level(Level::Trace);
        telem.log_f64(Level::Trace, "hidden", || 2.0);
        assert_eq!(sink.get_f64("hidden"), Some(2.0));
    }

    #[test]
    fn test_log_serialize_flattens() {
        let sink = Arc::new(MemorySink::default());
        let telem = Telemetry::new(Level::Trace, sink.clone());

        telem.log_serialize(Level::Comp, "req", || Speeds {
            vx_ms: 1.0,
            vy_ms: -2.0,
            angle_rad: None,
        });

        assert_eq!(sink.get_f64("req/vx_ms"), Some(1.0));
        assert_eq!(sink.get_f64("req/vy_ms"), Some(-2.0));
        assert!(sink.get("req/angle_rad").is_none());
        assert_eq!(sink.len(), 2);
    }
}
