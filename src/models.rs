//! Data models and structures
//!
//! Defines the per-request data carried through the pipelines and the
//! outcome records returned to callers.

use crate::Error;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded image and the logical name it will be stored under.
///
/// Cloning is cheap and shares the underlying buffer; it is never mutated.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    pub bytes: Bytes,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
}

/// Result of one transform-then-upload pipeline.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub policy: String,
    pub target: Option<UploadTarget>,
    pub bytes_written: usize,
    pub error: Option<Error>,
}

impl PipelineOutcome {
    pub fn succeeded(policy: String, target: UploadTarget, bytes_written: usize) -> Self {
        Self {
            policy,
            target: Some(target),
            bytes_written,
            error: None,
        }
    }

    pub fn failed(policy: String, target: Option<UploadTarget>, error: Error) -> Self {
        Self {
            policy,
            target,
            bytes_written: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Combined outcome of every pipeline run for one request, in policy order.
#[derive(Debug)]
pub struct RequestOutcome {
    pub request_id: Uuid,
    pub name: String,
    pub pipelines: Vec<PipelineOutcome>,
    /// Set when cancellation fired after the pipelines started. Pipelines
    /// that were already uploading may still have succeeded.
    pub cancelled: bool,
}

impl RequestOutcome {
    /// True only when every pipeline succeeded.
    pub fn is_success(&self) -> bool {
        self.pipelines.iter().all(PipelineOutcome::is_success)
    }

    /// True when some artifacts were stored and others were not.
    pub fn is_partial(&self) -> bool {
        let stored = self.succeeded().count();
        stored > 0 && stored < self.pipelines.len()
    }

    pub fn pipeline(&self, policy: &str) -> Option<&PipelineOutcome> {
        self.pipelines.iter().find(|p| p.policy == policy)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &PipelineOutcome> {
        self.pipelines.iter().filter(|p| p.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PipelineOutcome> {
        self.pipelines.iter().filter(|p| !p.is_success())
    }

    /// True when nothing was stored and every failure came from the source
    /// bytes themselves.
    pub fn is_source_rejected(&self) -> bool {
        self.succeeded().next().is_none()
            && self
                .failures()
                .all(|p| p.error.as_ref().is_some_and(Error::is_source_error))
    }

    pub fn report(&self) -> OutcomeReport {
        let error = if self.is_success() {
            None
        } else {
            Some(
                self.failures()
                    .map(|p| match &p.error {
                        Some(e) => format!("{}: {}", p.policy, e),
                        None => p.policy.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        OutcomeReport {
            success: self.is_success(),
            error,
            cancelled: self.cancelled,
            pipelines: self
                .pipelines
                .iter()
                .map(|p| PipelineReport {
                    policy: p.policy.clone(),
                    success: p.is_success(),
                    bucket: p.target.as_ref().map(|t| t.bucket.clone()),
                    key: p.target.as_ref().map(|t| t.key.clone()),
                    error: p.error.as_ref().map(|e| e.to_string()),
                    kind: p.error.as_ref().map(|e| e.kind().to_string()),
                })
                .collect(),
        }
    }
}

/// Serializable view of a [`RequestOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipelines: Vec<PipelineReport>,
}

impl OutcomeReport {
    pub fn rejected(error: &Error) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            cancelled: matches!(error, Error::Cancelled),
            pipelines: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub policy: String,
    pub success: bool,
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub error: Option<String>,
    pub kind: Option<String>,
}
