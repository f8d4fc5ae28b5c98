//! Pipeline observer.
//!
//! Pipeline stages report events through an injected [`PipelineObserver`]
//! instead of calling the logging backend directly, so tests can assert on
//! what was reported.

use std::fmt::Write as _;
use std::sync::Mutex;

/// Severity of a pipeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Receiver of pipeline events.
pub trait PipelineObserver: Send + Sync {
    fn log(&self, level: EventLevel, event: &str, fields: &[(&'static str, String)]);
}

/// Observer that forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn log(&self, level: EventLevel, event: &str, fields: &[(&'static str, String)]) {
        let rendered = render_fields(fields);
        match level {
            EventLevel::Debug => tracing::debug!(target: "citeflow", event, fields = %rendered),
            EventLevel::Info => tracing::info!(target: "citeflow", event, fields = %rendered),
            EventLevel::Warn => tracing::warn!(target: "citeflow", event, fields = %rendered),
            EventLevel::Error => tracing::error!(target: "citeflow", event, fields = %rendered),
        }
    }
}

fn render_fields(fields: &[(&'static str, String)]) -> String {
    let mut out = String::new();
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{}={}", key, value);
    }
    out
}

/// A captured event, as stored by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub level: EventLevel,
    pub event: String,
    pub fields: Vec<(String, String)>,
}

impl RecordedEvent {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Observer that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events with the given name, in emission order.
    pub fn named(&self, event: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event == event)
            .collect()
    }
}

impl PipelineObserver for RecordingObserver {
    fn log(&self, level: EventLevel, event: &str, fields: &[(&'static str, String)]) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent {
                level,
                event: event.to_string(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fields() {
        let fields = vec![("user", "ana".to_string()), ("source_id", "wiki".to_string())];
        assert_eq!(render_fields(&fields), "user=ana source_id=wiki");
    }

    #[test]
    fn test_recording_observer() {
        let observer = RecordingObserver::new();
        observer.log(EventLevel::Warn, "retrieve.failed", &[("user", "ana".to_string())]);
        observer.log(EventLevel::Info, "augment.completed", &[]);

        let failed = observer.named("retrieve.failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].level, EventLevel::Warn);
        assert_eq!(failed[0].field("user"), Some("ana"));
        assert_eq!(observer.events().len(), 2);
    }
}
