//! Chained invocation scheduler
//!
//! Each invocation mirrors exactly one repository, then either dispatches the
//! next index to a fresh invocation or stops. A failure stops the chain; the
//! external trigger starts a new sweep later and the skip engine makes the
//! repeated work cheap.

use crate::chain::continuation::Continuation;
use crate::chain::job::JobDescriptor;
use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use crate::mirror::orchestrator::{RepositoryMirror, RepositoryReport};
use crate::repolist::{RepositoryListProvider, fingerprint};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// What one invocation did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    NothingToDo,
    IndexOutOfRange {
        index: i64,
        length: usize,
    },
    SingleShot {
        report: RepositoryReport,
    },
    Chained {
        index: usize,
        length: usize,
        next: JobDescriptor,
        report: RepositoryReport,
    },
    Complete {
        index: usize,
        length: usize,
        report: RepositoryReport,
    },
}

impl InvocationOutcome {
    pub fn report(&self) -> Option<&RepositoryReport> {
        match self {
            InvocationOutcome::SingleShot { report }
            | InvocationOutcome::Chained { report, .. }
            | InvocationOutcome::Complete { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn next(&self) -> Option<&JobDescriptor> {
        match self {
            InvocationOutcome::Chained { next, .. } => Some(next),
            _ => None,
        }
    }

    /// One-line description for logs and the CLI
    pub fn summary(&self) -> String {
        match self {
            InvocationOutcome::NothingToDo => "no repositories to process".to_string(),
            InvocationOutcome::IndexOutOfRange { index, length } => {
                format!("index {} >= repo count {}; nothing to do", index, length)
            }
            InvocationOutcome::SingleShot { report } => {
                format!("mirrored explicit repo {}", report.source)
            }
            InvocationOutcome::Chained { next, .. } => match next.index {
                Some(index) => format!("queued next index={}", index),
                None => "queued continuation".to_string(),
            },
            InvocationOutcome::Complete { length, .. } => {
                format!("completed all {} repos", length)
            }
        }
    }
}

pub struct ChainScheduler {
    lists: Arc<dyn RepositoryListProvider>,
    mirror: Arc<dyn RepositoryMirror>,
    continuation: Arc<dyn Continuation>,
    start_index: i64,
    output: Logger,
}

impl ChainScheduler {
    pub fn new(
        lists: Arc<dyn RepositoryListProvider>,
        mirror: Arc<dyn RepositoryMirror>,
        continuation: Arc<dyn Continuation>,
        start_index: i64,
        output: Logger,
    ) -> Self {
        Self {
            lists,
            mirror,
            continuation,
            start_index,
            output,
        }
    }

    /// Entry point for raw trigger payloads
    pub async fn handle_payload(&self, payload: &Value) -> Result<InvocationOutcome> {
        let job = match JobDescriptor::from_payload(payload, self.start_index) {
            Ok(job) => job,
            Err(err) => {
                self.output
                    .warning(&format!("event parse failed ({}); defaulting to index=0", err));
                JobDescriptor::at_index(0)
            }
        };
        self.handle(job).await
    }

    pub async fn handle(&self, job: JobDescriptor) -> Result<InvocationOutcome> {
        let started = Instant::now();

        if let Some(repo) = job.explicit_repo() {
            self.output.info(&format!("Processing explicit repo: {}", repo));
            let report = self.mirror.mirror(repo).await?;
            self.output.info(&format!(
                "Done explicit repo in {}",
                self.output.format_duration(started.elapsed())
            ));
            return Ok(InvocationOutcome::SingleShot { report });
        }

        let repos = self
            .lists
            .resolve()
            .await
            .map_err(|e| match e {
                MirrorError::Discovery(_) | MirrorError::Configuration(_) => e,
                other => MirrorError::Discovery(format!("load repo list: {}", other)),
            })?;

        if repos.is_empty() {
            self.output.info("No repositories to process; exiting.");
            return Ok(InvocationOutcome::NothingToDo);
        }

        let current_fingerprint = fingerprint(&repos);
        if let Some(expected) = job.fingerprint.as_deref() {
            if expected != current_fingerprint {
                return Err(MirrorError::Discovery(format!(
                    "repository list changed mid-sweep (fingerprint {} != {})",
                    expected, current_fingerprint
                )));
            }
        }

        let requested = job.index.unwrap_or(self.start_index);
        let index = requested.max(0);
        let position = match usize::try_from(index) {
            Ok(position) if position < repos.len() => position,
            _ => {
                self.output.info(&format!(
                    "Index {} >= repo count {}; nothing to do.",
                    index,
                    repos.len()
                ));
                return Ok(InvocationOutcome::IndexOutOfRange {
                    index,
                    length: repos.len(),
                });
            }
        };

        let current = &repos[position];
        self.output.info(&format!(
            "Processing repo {}/{}: {}",
            position + 1,
            repos.len(),
            current
        ));

        let report = self.mirror.mirror(current).await?;

        let next = position + 1;
        if next < repos.len() {
            let job = JobDescriptor::at_index(next as i64).with_fingerprint(current_fingerprint);
            self.continuation.dispatch(&job).await.map_err(|e| match e {
                MirrorError::Dispatch(_) | MirrorError::Configuration(_) => e,
                other => MirrorError::Dispatch(format!("invoke self for index={}: {}", next, other)),
            })?;
            self.output.info(&format!(
                "Queued next index={} (elapsed {})",
                next,
                self.output.format_duration(started.elapsed())
            ));
            Ok(InvocationOutcome::Chained {
                index: position,
                length: repos.len(),
                next: job,
                report,
            })
        } else {
            self.output.success(&format!(
                "Completed all {} repos (elapsed {})",
                repos.len(),
                self.output.format_duration(started.elapsed())
            ));
            Ok(InvocationOutcome::Complete {
                index: position,
                length: repos.len(),
                report,
            })
        }
    }
}
