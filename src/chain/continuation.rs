//! Continuation dispatch
//!
//! In Lambda the next job is an asynchronous self-invocation. Locally it is
//! pushed onto an in-process FIFO that the runner drains.

use crate::chain::job::JobDescriptor;
use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use async_trait::async_trait;
use aws_sdk_lambda::Client;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use std::collections::VecDeque;
use std::sync::Mutex;

#[async_trait]
pub trait Continuation: Send + Sync {
    /// Hand `job` to a fresh invocation without waiting for it
    async fn dispatch(&self, job: &JobDescriptor) -> Result<()>;
}

pub struct LambdaContinuation {
    client: Client,
    function_name: Option<String>,
    output: Logger,
}

impl LambdaContinuation {
    pub fn new(config: &aws_config::SdkConfig, function_name: Option<String>, output: Logger) -> Self {
        Self {
            client: Client::new(config),
            function_name,
            output,
        }
    }
}

#[async_trait]
impl Continuation for LambdaContinuation {
    async fn dispatch(&self, job: &JobDescriptor) -> Result<()> {
        let function_name = self.function_name.as_deref().ok_or_else(|| {
            MirrorError::Configuration("AWS_LAMBDA_FUNCTION_NAME not set".to_string())
        })?;

        let payload = serde_json::to_vec(job)
            .map_err(|e| MirrorError::Dispatch(format!("encode job: {}", e)))?;

        self.client
            .invoke()
            .function_name(function_name)
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|err| {
                MirrorError::Dispatch(format!(
                    "invoke {} for {:?}: {}",
                    function_name,
                    job,
                    DisplayErrorContext(&err)
                ))
            })?;

        self.output
            .verbose(&format!("Invoked {} asynchronously", function_name));
        Ok(())
    }
}

/// In-process stand-in for self-invocation
#[derive(Debug, Default)]
pub struct LocalRelay {
    queue: Mutex<VecDeque<JobDescriptor>>,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Result<Option<JobDescriptor>> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| MirrorError::Dispatch("local relay lock poisoned".to_string()))?;
        Ok(queue.pop_front())
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Continuation for LocalRelay {
    async fn dispatch(&self, job: &JobDescriptor) -> Result<()> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| MirrorError::Dispatch("local relay lock poisoned".to_string()))?;
        queue.push_back(job.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relay_is_fifo() {
        let relay = LocalRelay::new();
        relay.dispatch(&JobDescriptor::at_index(1)).await.unwrap();
        relay.dispatch(&JobDescriptor::at_index(2)).await.unwrap();
        assert_eq!(relay.len(), 2);
        assert_eq!(relay.pop().unwrap(), Some(JobDescriptor::at_index(1)));
        assert_eq!(relay.pop().unwrap(), Some(JobDescriptor::at_index(2)));
        assert!(relay.is_empty());
        assert_eq!(relay.pop().unwrap(), None);
    }

    #[tokio::test]
    async fn poisoned_relay_reports_an_error() {
        let relay = LocalRelay::new();
        relay.dispatch(&JobDescriptor::at_index(1)).await.unwrap();

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = relay.queue.lock().unwrap();
            panic!("worker died holding the queue");
        }));

        assert!(matches!(relay.pop(), Err(MirrorError::Dispatch(_))));
        assert!(relay.dispatch(&JobDescriptor::at_index(2)).await.is_err());
    }
}
