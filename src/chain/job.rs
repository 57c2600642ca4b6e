//! Job descriptors: the payload one invocation hands to the next

use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl JobDescriptor {
    pub fn at_index(index: i64) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }

    pub fn for_repo(repo: impl Into<String>) -> Self {
        Self {
            repo: Some(repo.into()),
            ..Self::default()
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Non-blank explicit repository, if this is a single-shot job
    pub fn explicit_repo(&self) -> Option<&str> {
        self.repo.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    /// Interpret a trigger payload.
    ///
    /// `null`, `{}` and objects carrying neither `index` nor `repo` start at
    /// `start_index`. Unknown fields are ignored. Anything that is not an
    /// object, or whose known fields have the wrong type, is a parse error.
    pub fn from_payload(payload: &Value, start_index: i64) -> Result<Self> {
        let mut job = match payload {
            Value::Null => Self::default(),
            Value::Object(_) => serde_json::from_value::<Self>(payload.clone())
                .map_err(|e| MirrorError::Parse(format!("invalid job payload: {}", e)))?,
            other => {
                return Err(MirrorError::Parse(format!(
                    "job payload must be an object, got {}",
                    other
                )));
            }
        };

        if job.index.is_none() && job.explicit_repo().is_none() {
            job.index = Some(start_index);
        }
        Ok(job)
    }
}
