//! User-facing message catalog
//!
//! These are the only strings the presentation layer shows for failures.
//! Raw error detail goes to the log, never here.

pub const NETWORK: &str = "Connection error. Please check your internet connection.";
pub const GENERIC: &str = "Something went wrong. Please try again.";
pub const OFFLINE: &str = "No internet connection";

pub const CAMERA_NOT_SUPPORTED: &str = "This device does not support camera access.";
pub const CAMERA_PERMISSION_DENIED: &str = "Camera access must be allowed to continue.";
pub const CAMERA_NOT_FOUND: &str = "No camera was found.";
pub const CAMERA_NOT_STREAMING: &str = "The camera is not active.";
pub const CAPTURE_FAILED: &str = "The photo could not be captured.";

pub const INVALID_WORKER_ID: &str = "Invalid id. It must have 13 digits (format: 0801-2001-21228).";
pub const WORKER_NOT_FOUND: &str = "Worker not found.";
pub const NO_SITE_SELECTED: &str = "A site must be selected.";
pub const NO_CREW_SELECTED: &str = "A crew must be selected.";
pub const NO_WORKERS: &str = "At least one worker must be added.";
pub const NO_PHOTO: &str = "A photo must be captured.";
pub const DUPLICATE_WORKER: &str = "This worker was already added.";
pub const SINGLE_WORKER_ONLY: &str = "Only one worker can be registered at a time.";

pub const CHECK_IN_SUCCESS: &str = "Check-in registered successfully.";
pub const CHECK_OUT_SUCCESS: &str = "Check-out registered successfully.";
pub const WORKER_ADDED: &str = "Worker added to the list.";
pub const PHOTO_CAPTURED: &str = "Photo captured.";

pub const SUCCESS_TITLE: &str = "Registration Successful";
pub const PARTIAL_TITLE: &str = "Partial Registration";

/// Roster limit message for operational batches
pub fn roster_full(max: usize) -> String {
    format!("A maximum of {} workers is allowed.", max)
}

/// Observations length message
pub fn observations_too_long(max: usize) -> String {
    format!("Observations may not exceed {} characters.", max)
}

/// Body of the partial-success notification
pub fn partial_summary(succeeded: usize, failed: usize) -> String {
    format!(
        "{} worker(s) registered successfully.\n{} worker(s) could not be registered.",
        succeeded, failed
    )
}

/// Body of the all-failed notification
pub fn nothing_registered(failures: &str) -> String {
    format!("No worker could be registered:\n\n{}", failures)
}

/// Toast after pending check-outs were merged into the roster
pub fn pending_loaded(count: usize) -> String {
    format!("{} worker(s) with pending check-out loaded", count)
}

pub const NO_PENDING: &str = "No workers with pending check-out";
