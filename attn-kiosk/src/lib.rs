//! attn-kiosk library interface
//!
//! Exposes the kiosk core for the binary and for integration testing:
//! transport with retry, the typed action gateway, photo capture and
//! compression, result reconciliation and the check-in/check-out session.

pub mod capture;
pub mod error;
pub mod gateway;
pub mod geolocation;
pub mod preferences;
pub mod reconciler;
pub mod session;
pub mod transport;

pub use crate::error::{KioskError, ValidationError};
pub use crate::gateway::RemoteGateway;
pub use crate::reconciler::Reconciliation;
pub use crate::session::{KioskSession, SessionParts, WorkerRoster};
pub use crate::transport::TransportClient;
