//! Observability sink for engine events
//!
//! The engine reports every parsed response that carries parameters, and
//! every command that finally failed. Observers are fire-and-forget: nothing
//! they do can change the outcome of a transaction.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Receiver of engine notifications
pub trait ResponseObserver: Send {
    /// A response with at least one parameter was parsed
    fn notify(&mut self, command_name: &str, parameters: &[String]);

    /// A command failed for good; `context` names the command and outcome
    fn notify_error(&mut self, context: &str);
}

/// Default observer: forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ResponseObserver for TracingObserver {
    fn notify(&mut self, command_name: &str, parameters: &[String]) {
        tracing::info!(command = command_name, ?parameters, "modem response");
    }

    fn notify_error(&mut self, context: &str) {
        tracing::error!("{}", context);
    }
}

/// A single recorded notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    /// A response with parameters
    Response {
        /// Leading command name, e.g. `+CSQ`
        command_name: String,
        /// Response parameters
        parameters: Vec<String>,
    },
    /// A terminal failure, with its context message
    Error(String),
}

/// Observer keeping every event in memory, with the time it was seen.
///
/// Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<(DateTime<Utc>, ObservedEvent)>>>,
}

impl RecordingObserver {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Events in arrival order, without timestamps
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events
            .lock()
            .map(|events| events.iter().map(|(_, e)| e.clone()).collect())
            .unwrap_or_default()
    }

    /// Events in arrival order, with the UTC time they were recorded
    pub fn timestamped(&self) -> Vec<(DateTime<Utc>, ObservedEvent)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn push(&self, event: ObservedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((Utc::now(), event));
        }
    }
}

impl ResponseObserver for RecordingObserver {
    fn notify(&mut self, command_name: &str, parameters: &[String]) {
        self.push(ObservedEvent::Response {
            command_name: command_name.to_string(),
            parameters: parameters.to_vec(),
        });
    }

    fn notify_error(&mut self, context: &str) {
        self.push(ObservedEvent::Error(context.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_shares_log_between_clones() {
        let observer = RecordingObserver::new();
        let mut handle = observer.clone();
        handle.notify("+CSQ", &["15".to_string(), "99".to_string()]);
        handle.notify_error("AT+CGATT=1 failed");

        assert_eq!(
            observer.events(),
            vec![
                ObservedEvent::Response {
                    command_name: "+CSQ".to_string(),
                    parameters: vec!["15".to_string(), "99".to_string()],
                },
                ObservedEvent::Error("AT+CGATT=1 failed".to_string()),
            ]
        );
        let stamps = observer.timestamped();
        assert!(stamps[0].0 <= stamps[1].0);
    }
}
