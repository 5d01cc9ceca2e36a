//! Wire data model for the attendance API
//!
//! The remote API speaks Spanish field names (`dni`, `sede`, `cuadrilla`...).
//! Rust-side names are English; serde renames map between the two.

use crate::worker_id::WorkerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Submission channel tag sent with every check-in/out
pub const SUBMISSION_CHANNEL: &str = "Sistema Web";

/// Envelope returned by every remote action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// A physical work location. The API lists sites as plain names.
pub type Site = String;

/// A named crew belonging to one site and one area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crew {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(default)]
    pub area: Option<String>,
}

/// A worker held in the session roster. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    #[serde(rename = "dni")]
    pub id: WorkerId,
    #[serde(rename = "nombreCompleto")]
    pub full_name: String,
}

impl WorkerRecord {
    pub fn new(id: WorkerId, full_name: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
        }
    }
}

/// Per-worker outcome of a batch register call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    #[serde(default, alias = "dni")]
    pub worker_id: String,
    #[serde(default, alias = "nombre")]
    pub worker_name: String,
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Role of the operator, derived from whether a crew was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Field crew lead registering a crew batch
    #[serde(rename = "Operativo")]
    Operational,
    /// Office worker registering themselves
    #[serde(rename = "Administrativo")]
    Administrative,
}

impl Role {
    pub fn for_crew(crew: Option<&str>) -> Self {
        match crew {
            Some(c) if !c.is_empty() => Role::Operational,
            _ => Role::Administrative,
        }
    }
}

/// The two submission kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceKind {
    CheckIn,
    CheckOut,
}

impl AttendanceKind {
    pub fn action_name(self) -> &'static str {
        match self {
            AttendanceKind::CheckIn => "registrarEntrada",
            AttendanceKind::CheckOut => "registrarSalida",
        }
    }
}

/// Best-effort device position; both fields null when unavailable
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(rename = "latitud")]
    pub latitude: Option<f64>,
    #[serde(rename = "longitud")]
    pub longitude: Option<f64>,
}

impl Coordinates {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn known(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }
}

/// Session data submitted by the caller of a register action
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRequest {
    pub workers: Vec<WorkerRecord>,
    pub site: Site,
    pub area: Option<String>,
    pub crew: Option<String>,
    /// `data:image/jpeg;base64,...` URL
    pub photo_base64: String,
    pub observations: String,
    pub coordinates: Coordinates,
}

/// Params object of `registrarEntrada` / `registrarSalida`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    #[serde(rename = "colaboradores")]
    pub workers: Vec<WorkerRecord>,
    #[serde(rename = "sede")]
    pub site: Site,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(rename = "cuadrilla", skip_serializing_if = "Option::is_none")]
    pub crew: Option<String>,
    #[serde(rename = "fotoBase64")]
    pub photo_base64: String,
    #[serde(rename = "observaciones")]
    pub observations: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
    #[serde(rename = "usuarioRegistro")]
    pub registered_by: String,
    #[serde(rename = "tipoUsuario")]
    pub role: Role,
}

impl SubmissionPayload {
    /// Attach the fixed channel and role metadata
    pub fn from_request(request: SubmissionRequest) -> Self {
        let role = Role::for_crew(request.crew.as_deref());
        Self {
            workers: request.workers,
            site: request.site,
            area: request.area,
            crew: request.crew,
            photo_base64: request.photo_base64,
            observations: request.observations,
            coordinates: request.coordinates,
            registered_by: SUBMISSION_CHANNEL.to_string(),
            role,
        }
    }
}
