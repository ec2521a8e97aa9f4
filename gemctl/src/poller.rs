//! Long-running operation polling.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Operation;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Anything that can report the current state of an operation.
#[async_trait]
pub trait OperationSource: Send + Sync {
    async fn get_operation(&self, name: &str) -> Result<Operation>;
}

/// Wait budget for a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Polls an operation until it is done, failed, or out of time.
pub struct OperationPoller<'a, S: ?Sized> {
    source: &'a S,
    policy: PollPolicy,
}

impl<'a, S: OperationSource + ?Sized> OperationPoller<'a, S> {
    pub fn new(source: &'a S, policy: PollPolicy) -> Self {
        Self { source, policy }
    }

    /// Polls `operation_name` and returns the resolved resource name.
    ///
    /// The name comes from the operation response when it carries one and
    /// falls back to `fallback_name` otherwise. No poll is issued once the
    /// timeout has elapsed.
    pub async fn wait(&self, operation_name: &str, fallback_name: &str) -> Result<String> {
        let start = Instant::now();
        let mut polls = 0u32;

        while start.elapsed() < self.policy.timeout {
            let operation = self.source.get_operation(operation_name).await?;
            polls += 1;
            if operation.done {
                debug!("Operation {} done after {} poll(s)", operation_name, polls);
                return finish(&operation, fallback_name);
            }
            debug!("Operation {} still running (poll {})", operation_name, polls);
            let remaining = self.policy.timeout.saturating_sub(start.elapsed());
            sleep(self.policy.interval.min(remaining)).await;
        }

        Err(Error::Timeout {
            name: operation_name.to_string(),
            waited: start.elapsed(),
        })
    }

    /// Like [`wait`](Self::wait), but skips polling when `operation` is
    /// already done.
    pub async fn wait_for(&self, operation: &Operation, fallback_name: &str) -> Result<String> {
        if operation.done {
            return finish(operation, fallback_name);
        }
        self.wait(&operation.name, fallback_name).await
    }
}

fn finish(operation: &Operation, fallback_name: &str) -> Result<String> {
    if let Some(error) = &operation.error {
        return Err(Error::Operation {
            name: operation.name.clone(),
            message: error.to_string(),
        });
    }
    let resolved = operation
        .response
        .as_ref()
        .and_then(|response| response.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty());
    Ok(resolved.unwrap_or(fallback_name).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OperationError;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const OP: &str = "projects/p/locations/us/operations/op-1";
    const FALLBACK: &str = "projects/p/locations/us/collections/default_collection/dataStores/ds1";

    /// Replays scripted operation states, then reports "not done" forever.
    struct Scripted {
        states: Mutex<VecDeque<Operation>>,
        polled_at: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(states: Vec<Operation>) -> Self {
            Self {
                states: Mutex::new(states.into()),
                polled_at: Mutex::new(Vec::new()),
            }
        }

        fn polls(&self) -> Vec<Instant> {
            self.polled_at.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OperationSource for Scripted {
        async fn get_operation(&self, name: &str) -> Result<Operation> {
            self.polled_at.lock().unwrap().push(Instant::now());
            Ok(self
                .states
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| running(name)))
        }
    }

    fn running(name: &str) -> Operation {
        Operation {
            name: name.to_string(),
            done: false,
            error: None,
            response: None,
        }
    }

    fn failed() -> Operation {
        Operation {
            done: true,
            error: Some(OperationError {
                code: 3,
                message: "invalid data store config".into(),
            }),
            ..running(OP)
        }
    }

    fn policy(timeout: u64, interval: u64) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_secs(timeout),
            interval: Duration::from_secs(interval),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_after_k_running_polls() {
        let k = 3;
        let mut states: Vec<_> = (0..k).map(|_| running(OP)).collect();
        states.push(failed());
        let source = Scripted::new(states);

        let err = OperationPoller::new(&source, policy(300, 5))
            .wait(OP, FALLBACK)
            .await
            .unwrap_err();

        match err {
            Error::Operation { name, message } => {
                assert_eq!(name, OP);
                assert!(message.contains("invalid data store config"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let polls = source.polls();
        assert_eq!(polls.len(), k + 1);
        for pair in polls.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stops_polling_at_deadline() {
        let source = Scripted::new(vec![]);
        let start = Instant::now();

        let err = OperationPoller::new(&source, policy(20, 5))
            .wait(OP, FALLBACK)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        let polls = source.polls();
        assert_eq!(polls.len(), 4);
        assert!(polls.iter().all(|t| *t - start < Duration::from_secs(20)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_sleep_ends_at_deadline() {
        let source = Scripted::new(vec![]);
        let start = Instant::now();

        let err = OperationPoller::new(&source, policy(12, 5))
            .wait(OP, FALLBACK)
            .await
            .unwrap_err();

        match err {
            Error::Timeout { waited, .. } => {
                assert!(waited >= Duration::from_secs(12));
                assert!(waited < Duration::from_secs(13));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Polls at 0s, 5s and 10s, then a 2s sleep instead of 5s.
        assert_eq!(source.polls().len(), 3);
        assert!(start.elapsed() < Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_with_response_name() {
        let done = Operation {
            done: true,
            response: Some(json!({"name": "projects/p/resolved"})),
            ..running(OP)
        };
        let source = Scripted::new(vec![running(OP), done]);
        let name = OperationPoller::new(&source, PollPolicy::default())
            .wait(OP, FALLBACK)
            .await
            .unwrap();
        assert_eq!(name, "projects/p/resolved");
        assert_eq!(source.polls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_without_name_uses_fallback() {
        let done = Operation {
            done: true,
            response: Some(json!({"@type": "type.googleapis.com/DataStore"})),
            ..running(OP)
        };
        let source = Scripted::new(vec![done]);
        let name = OperationPoller::new(&source, PollPolicy::default())
            .wait(OP, FALLBACK)
            .await
            .unwrap();
        assert_eq!(name, FALLBACK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_done_operation_skips_polling() {
        let source = Scripted::new(vec![]);
        let done = Operation {
            done: true,
            ..running(OP)
        };
        let name = OperationPoller::new(&source, PollPolicy::default())
            .wait_for(&done, FALLBACK)
            .await
            .unwrap();
        assert_eq!(name, FALLBACK);
        assert!(source.polls().is_empty());
    }
}
