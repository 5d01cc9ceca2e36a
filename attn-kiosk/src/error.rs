//! Error types for attn-kiosk
//!
//! [`KioskError`] is the session boundary error. Each variant maps to exactly
//! one user-facing message; the wrapped detail is for logs only.

use crate::capture::CameraError;
use crate::gateway::GatewayError;
use attn_common::messages;
use attn_common::worker_id::WorkerIdError;
use attn_common::WorkerId;
use thiserror::Error;

/// Input problems caught before any network call
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid worker id: {0}")]
    InvalidWorkerId(#[from] WorkerIdError),

    #[error("no site selected")]
    NoSite,

    #[error("no crew selected")]
    NoCrew,

    #[error("no workers in the roster")]
    NoWorkers,

    #[error("no photo captured")]
    NoPhoto,

    #[error("worker {0} already in the roster")]
    DuplicateWorker(WorkerId),

    #[error("roster is full ({max} workers)")]
    RosterFull { max: usize },

    #[error("observations exceed {max} characters")]
    ObservationsTooLong { max: usize },

    #[error("no role or action selected")]
    NoMode,

    #[error("no looked-up worker to add")]
    NothingToAdd,
}

impl ValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::InvalidWorkerId(_) => messages::INVALID_WORKER_ID.to_string(),
            ValidationError::NoSite => messages::NO_SITE_SELECTED.to_string(),
            ValidationError::NoCrew => messages::NO_CREW_SELECTED.to_string(),
            ValidationError::NoWorkers | ValidationError::NothingToAdd => {
                messages::NO_WORKERS.to_string()
            }
            ValidationError::NoPhoto => messages::NO_PHOTO.to_string(),
            ValidationError::DuplicateWorker(_) => messages::DUPLICATE_WORKER.to_string(),
            ValidationError::RosterFull { max: 1 } => messages::SINGLE_WORKER_ONLY.to_string(),
            ValidationError::RosterFull { max } => messages::roster_full(*max),
            ValidationError::ObservationsTooLong { max } => messages::observations_too_long(*max),
            ValidationError::NoMode => messages::GENERIC.to_string(),
        }
    }
}

/// Session boundary errors
#[derive(Debug, Error)]
pub enum KioskError {
    /// Transport or response-shape failure talking to the API
    #[error("network error: {0}")]
    Network(#[from] GatewayError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The server answered `success: false`
    #[error("remote failure: {0}")]
    Remote(String),
}

impl KioskError {
    /// The single notification text for this failure
    pub fn user_message(&self) -> String {
        match self {
            KioskError::Network(_) => messages::NETWORK.to_string(),
            KioskError::Camera(e) => e.user_message().to_string(),
            KioskError::Validation(e) => e.user_message(),
            KioskError::Remote(message) => message.clone(),
        }
    }
}

impl From<WorkerIdError> for KioskError {
    fn from(err: WorkerIdError) -> Self {
        KioskError::Validation(ValidationError::InvalidWorkerId(err))
    }
}
