// src/exec/log_consumer.rs

//! Line classification for process output.
//!
//! Every line read from the child's stdout or stderr goes through
//! [`LogConsumer::accept`]. Lines are counted per stream; lines carrying an
//! output marker additionally update the shared output map:
//!
//! ```text
//! ::{"outputs": {"rows": 42, "status": "ok"}}::
//! ```
//!
//! Anything that merely looks like a marker but does not parse is treated as
//! plain log text.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::logging::OUTPUT_TARGET;
use crate::types::StreamKind;

const MARKER_PREFIX: &str = "::{";
const MARKER_SUFFIX: &str = "}::";

/// Shared accumulator for one execution's output.
///
/// Both stream readers call [`accept`](Self::accept) concurrently: the
/// counters are independent atomics, the output map sits behind a mutex.
#[derive(Debug, Default)]
pub struct LogConsumer {
    std_out_count: AtomicUsize,
    std_err_count: AtomicUsize,
    outputs: Mutex<HashMap<String, Value>>,
}

impl LogConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self, stream: StreamKind, line: &str) {
        match stream {
            StreamKind::Stdout => self.std_out_count.fetch_add(1, Ordering::Relaxed),
            StreamKind::Stderr => self.std_err_count.fetch_add(1, Ordering::Relaxed),
        };

        if let Some(outputs) = parse_marker(line) {
            let mut guard = self.outputs.lock().unwrap_or_else(|e| e.into_inner());
            guard.extend(outputs);
            return;
        }

        match stream {
            StreamKind::Stdout => info!(target: OUTPUT_TARGET, stream = %stream, "{line}"),
            StreamKind::Stderr => warn!(target: OUTPUT_TARGET, stream = %stream, "{line}"),
        }
    }

    pub fn std_out_count(&self) -> usize {
        self.std_out_count.load(Ordering::Relaxed)
    }

    pub fn std_err_count(&self) -> usize {
        self.std_err_count.load(Ordering::Relaxed)
    }

    /// Snapshot of the outputs collected so far.
    pub fn outputs(&self) -> HashMap<String, Value> {
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Parse an output marker line, returning its `outputs` object.
///
/// Returns `None` for plain lines and for malformed markers.
pub fn parse_marker(line: &str) -> Option<Map<String, Value>> {
    let trimmed = line.trim();
    if trimmed.len() < MARKER_PREFIX.len() + MARKER_SUFFIX.len() - 1
        || !trimmed.starts_with(MARKER_PREFIX)
        || !trimmed.ends_with(MARKER_SUFFIX)
    {
        return None;
    }

    // Keep the braces, drop the surrounding "::".
    let json = &trimmed[2..trimmed.len() - 2];
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(mut body)) => match body.remove("outputs") {
            Some(Value::Object(outputs)) => Some(outputs),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    #[test]
    fn counts_lines_per_stream() {
        let consumer = LogConsumer::new();
        consumer.accept(StreamKind::Stdout, "a");
        consumer.accept(StreamKind::Stdout, "b");
        consumer.accept(StreamKind::Stderr, "oops");

        assert_eq!(consumer.std_out_count(), 2);
        assert_eq!(consumer.std_err_count(), 1);
        assert!(consumer.outputs().is_empty());
    }

    #[test]
    fn marker_lines_update_outputs_and_are_counted() {
        let consumer = LogConsumer::new();
        consumer.accept(StreamKind::Stdout, r#"::{"outputs":{"rows":42,"name":"x"}}::"#);

        assert_eq!(consumer.std_out_count(), 1);
        let outputs = consumer.outputs();
        assert_eq!(outputs.get("rows"), Some(&json!(42)));
        assert_eq!(outputs.get("name"), Some(&json!("x")));
    }

    #[test]
    fn last_write_wins_on_duplicate_keys() {
        let consumer = LogConsumer::new();
        consumer.accept(StreamKind::Stdout, r#"::{"outputs":{"k":"first"}}::"#);
        consumer.accept(StreamKind::Stderr, r#"  ::{"outputs":{"k":"second"}}::  "#);

        assert_eq!(consumer.outputs().get("k"), Some(&json!("second")));
    }

    #[test]
    fn malformed_markers_fall_back_to_plain_log() {
        assert!(parse_marker(r#"::{"outputs": {"k": }}::"#).is_none());
        assert!(parse_marker(r#"::{"outputs": [1, 2]}::"#).is_none());
        assert!(parse_marker(r#"::{"metrics": {}}::"#).is_none());
        assert!(parse_marker("::{}").is_none());
        assert!(parse_marker("}::").is_none());
        assert!(parse_marker("plain text").is_none());

        let consumer = LogConsumer::new();
        consumer.accept(StreamKind::Stdout, r#"::{"outputs": oops}::"#);
        assert_eq!(consumer.std_out_count(), 1);
        assert!(consumer.outputs().is_empty());
    }

    #[test]
    fn concurrent_writers_do_not_lose_updates() {
        let consumer = Arc::new(LogConsumer::new());
        let handles: Vec<_> = [StreamKind::Stdout, StreamKind::Stderr]
            .into_iter()
            .map(|stream| {
                let consumer = Arc::clone(&consumer);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let line = format!(r#"::{{"outputs":{{"{stream}_{i}":{i}}}}}::"#);
                        consumer.accept(stream, &line);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(consumer.std_out_count(), 500);
        assert_eq!(consumer.std_err_count(), 500);
        assert_eq!(consumer.outputs().len(), 1000);
    }
}
