//! Submission result reconciliation
//!
//! Turns the response of a batch register call into exactly one outcome and
//! the notification that presents it. Pure: no I/O besides logging.

use attn_common::events::KioskEvent;
use attn_common::messages;
use attn_common::models::{ApiResponse, AttendanceKind, SubmissionResult};
use tracing::warn;

/// Classification of a batch register response
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Every worker was registered
    AllSucceeded { results: Vec<SubmissionResult> },
    /// No worker was registered
    AllFailed { results: Vec<SubmissionResult> },
    /// Residual case: at least one success and at least one failure
    Mixed {
        succeeded: usize,
        failed: usize,
        results: Vec<SubmissionResult>,
    },
    /// The request itself failed; per-worker results were not inspected
    RequestFailed { message: String },
}

impl Reconciliation {
    /// True when at least one worker was registered server-side
    pub fn any_registered(&self) -> bool {
        matches!(
            self,
            Reconciliation::AllSucceeded { .. } | Reconciliation::Mixed { .. }
        )
    }

    /// Notification for the presentation layer
    pub fn to_event(&self, kind: AttendanceKind) -> KioskEvent {
        match self {
            Reconciliation::AllSucceeded { results } => KioskEvent::SubmissionSucceeded {
                title: messages::SUCCESS_TITLE.to_string(),
                message: success_message(kind).to_string(),
                results: results.clone(),
            },
            Reconciliation::AllFailed { results } => {
                let failures = results
                    .iter()
                    .map(|r| r.message.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                KioskEvent::SubmissionFailed {
                    message: messages::nothing_registered(&failures),
                }
            }
            Reconciliation::Mixed {
                succeeded,
                failed,
                results,
            } => KioskEvent::SubmissionPartial {
                title: messages::PARTIAL_TITLE.to_string(),
                message: messages::partial_summary(*succeeded, *failed),
                succeeded: *succeeded,
                failed: *failed,
                results: results.clone(),
            },
            Reconciliation::RequestFailed { message } => KioskEvent::SubmissionFailed {
                message: message.clone(),
            },
        }
    }
}

/// Fixed success text for each submission kind
pub fn success_message(kind: AttendanceKind) -> &'static str {
    match kind {
        AttendanceKind::CheckIn => messages::CHECK_IN_SUCCESS,
        AttendanceKind::CheckOut => messages::CHECK_OUT_SUCCESS,
    }
}

/// Classify a register response
///
/// `submitted` is the number of workers sent; a mismatch with the number of
/// results is logged but does not change the classification.
pub fn reconcile(response: ApiResponse<Vec<SubmissionResult>>, submitted: usize) -> Reconciliation {
    let results = match response {
        ApiResponse {
            success: true,
            data: Some(results),
            ..
        } if !results.is_empty() => results,
        ApiResponse { message, .. } => {
            return Reconciliation::RequestFailed {
                message: message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| messages::GENERIC.to_string()),
            };
        }
    };

    if results.len() != submitted {
        warn!(
            submitted,
            received = results.len(),
            "Result count does not match submitted worker count"
        );
    }

    // Single pass over the list
    let (succeeded, failed) = results.iter().fold((0usize, 0usize), |(ok, ko), r| {
        if r.success {
            (ok + 1, ko)
        } else {
            (ok, ko + 1)
        }
    });

    if failed == 0 {
        Reconciliation::AllSucceeded { results }
    } else if succeeded == 0 {
        Reconciliation::AllFailed { results }
    } else {
        Reconciliation::Mixed {
            succeeded,
            failed,
            results,
        }
    }
}
