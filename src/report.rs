use crate::SeedError;
use std::sync::Mutex;

/// Where a run sends the failures it absorbs.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &SeedError);
}

/// Emits every failure as a `tracing` error event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &SeedError) {
        match error {
            SeedError::SourceUnavailable { path, .. } | SeedError::Read { path, .. } => {
                tracing::error!(file = %path.display(), "{error}");
            }
            SeedError::InsertFailed { table, file, .. } => {
                tracing::error!(table = %table, file = %file.display(), "{error}");
            }
            SeedError::Config(_) => tracing::error!("{error}"),
        }
    }
}

/// Keeps rendered messages in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    messages: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, error: &SeedError) {
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push(error.to_string());
    }
}
