//! Remote action gateway
//!
//! One typed operation per business action. Responses are resolved here into
//! [`ActionReply`], a union keyed by the originating action, so nothing past
//! this boundary handles raw JSON.

use crate::transport::{RemoteAction, TransportClient, TransportError};
use attn_common::models::{
    ApiResponse, AttendanceKind, Crew, Site, SubmissionPayload, SubmissionRequest,
    SubmissionResult, WorkerRecord,
};
use attn_common::time;
use attn_common::WorkerId;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub const GET_SITES: &str = "getSedes";
pub const GET_CREWS: &str = "getCuadrillas";
pub const GET_WORKER: &str = "getColaborador";
pub const GET_PENDING: &str = "getRegistrosPendientes";

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to encode {action} params: {source}")]
    Encode {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected {action} response shape: {source}")]
    Decode {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A business action and its inputs
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ListSites,
    ListCrews {
        site: Site,
    },
    LookupWorker {
        id: WorkerId,
    },
    ListPending {
        site: Site,
        crew: String,
        date: NaiveDate,
    },
    Register {
        kind: AttendanceKind,
        request: SubmissionRequest,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::ListSites => GET_SITES,
            Action::ListCrews { .. } => GET_CREWS,
            Action::LookupWorker { .. } => GET_WORKER,
            Action::ListPending { .. } => GET_PENDING,
            Action::Register { kind, .. } => kind.action_name(),
        }
    }

    /// Build the wire-level action
    pub fn to_remote(&self) -> Result<RemoteAction, GatewayError> {
        let name = self.name();
        let params = match self {
            Action::ListSites => return Ok(RemoteAction::new(name)),
            Action::ListCrews { site } => json!({ "sede": site }),
            Action::LookupWorker { id } => json!({ "dni": id }),
            Action::ListPending { site, crew, date } => json!({
                "sede": site,
                "cuadrilla": crew,
                "fecha": time::api_date(*date),
            }),
            Action::Register { request, .. } => {
                let payload = SubmissionPayload::from_request(request.clone());
                serde_json::to_value(&payload)
                    .map_err(|source| GatewayError::Encode { action: name, source })?
            }
        };

        RemoteAction::with_params(name, &params)
            .map_err(|source| GatewayError::Encode { action: name, source })
    }
}

/// Typed response, keyed by the action that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum ActionReply {
    Sites(ApiResponse<Vec<Site>>),
    Crews(ApiResponse<Vec<Crew>>),
    Worker(ApiResponse<WorkerRecord>),
    Pending(ApiResponse<Vec<WorkerRecord>>),
    Registered {
        kind: AttendanceKind,
        response: ApiResponse<Vec<SubmissionResult>>,
    },
}

impl ActionReply {
    pub fn success(&self) -> bool {
        match self {
            ActionReply::Sites(r) => r.success,
            ActionReply::Crews(r) => r.success,
            ActionReply::Worker(r) => r.success,
            ActionReply::Pending(r) => r.success,
            ActionReply::Registered { response, .. } => response.success,
        }
    }
}

/// Resolve the `data` of a raw envelope into `T`
///
/// Data of a failed response is dropped rather than decoded, since servers
/// put arbitrary shapes there on failure.
fn resolve<T: DeserializeOwned>(
    action: &'static str,
    raw: Value,
) -> Result<ApiResponse<T>, GatewayError> {
    let envelope: ApiResponse<Value> =
        serde_json::from_value(raw).map_err(|source| GatewayError::Decode { action, source })?;

    let data = match envelope.data {
        Some(value) if envelope.success && !value.is_null() => Some(
            serde_json::from_value(value)
                .map_err(|source| GatewayError::Decode { action, source })?,
        ),
        _ => None,
    };

    Ok(ApiResponse {
        success: envelope.success,
        data,
        message: envelope.message,
    })
}

/// Like [`resolve`], but decodes list items one at a time
///
/// Items that fail to decode are logged and skipped, so one bad record does
/// not discard the rest of the list.
fn resolve_each<T: DeserializeOwned>(
    action: &'static str,
    raw: Value,
) -> Result<ApiResponse<Vec<T>>, GatewayError> {
    let response: ApiResponse<Vec<Value>> = resolve(action, raw)?;

    let data = response.data.map(|items| {
        items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(action, index, "Skipping undecodable record: {}", e);
                    None
                }
            })
            .collect()
    });

    Ok(ApiResponse {
        success: response.success,
        data,
        message: response.message,
    })
}

/// Typed facade over the transport client
#[derive(Debug, Clone)]
pub struct RemoteGateway {
    transport: TransportClient,
}

impl RemoteGateway {
    pub fn new(transport: TransportClient) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &TransportClient {
        &self.transport
    }

    async fn send(&self, action: &Action) -> Result<Value, GatewayError> {
        let remote = action.to_remote()?;
        Ok(self.transport.send(&remote).await?)
    }

    async fn call<T: DeserializeOwned>(&self, action: &Action) -> Result<ApiResponse<T>, GatewayError> {
        let response = resolve(action.name(), self.send(action).await?)?;
        debug!(action = action.name(), success = response.success, "Action resolved");
        Ok(response)
    }

    async fn call_each<T: DeserializeOwned>(
        &self,
        action: &Action,
    ) -> Result<ApiResponse<Vec<T>>, GatewayError> {
        let response = resolve_each(action.name(), self.send(action).await?)?;
        debug!(action = action.name(), success = response.success, "Action resolved");
        Ok(response)
    }

    /// Dispatch any action and get the keyed reply
    pub async fn invoke(&self, action: &Action) -> Result<ActionReply, GatewayError> {
        Ok(match action {
            Action::ListSites => ActionReply::Sites(self.call(action).await?),
            Action::ListCrews { .. } => ActionReply::Crews(self.call(action).await?),
            Action::LookupWorker { .. } => ActionReply::Worker(self.call(action).await?),
            Action::ListPending { .. } => ActionReply::Pending(self.call_each(action).await?),
            Action::Register { kind, .. } => ActionReply::Registered {
                kind: *kind,
                response: self.call(action).await?,
            },
        })
    }

    pub async fn list_sites(&self) -> Result<ApiResponse<Vec<Site>>, GatewayError> {
        self.call(&Action::ListSites).await
    }

    pub async fn list_crews(&self, site: &str) -> Result<ApiResponse<Vec<Crew>>, GatewayError> {
        self.call(&Action::ListCrews {
            site: site.to_string(),
        })
        .await
    }

    pub async fn lookup_worker(&self, id: &WorkerId) -> Result<ApiResponse<WorkerRecord>, GatewayError> {
        self.call(&Action::LookupWorker { id: id.clone() }).await
    }

    /// Workers checked in on `date` (today when `None`) without a check-out
    pub async fn list_pending(
        &self,
        site: &str,
        crew: &str,
        date: Option<NaiveDate>,
    ) -> Result<ApiResponse<Vec<WorkerRecord>>, GatewayError> {
        self.call_each(&Action::ListPending {
            site: site.to_string(),
            crew: crew.to_string(),
            date: date.unwrap_or_else(time::today),
        })
        .await
    }

    pub async fn register(
        &self,
        kind: AttendanceKind,
        request: SubmissionRequest,
    ) -> Result<ApiResponse<Vec<SubmissionResult>>, GatewayError> {
        self.call(&Action::Register { kind, request }).await
    }

    pub async fn register_check_in(
        &self,
        request: SubmissionRequest,
    ) -> Result<ApiResponse<Vec<SubmissionResult>>, GatewayError> {
        self.register(AttendanceKind::CheckIn, request).await
    }

    pub async fn register_check_out(
        &self,
        request: SubmissionRequest,
    ) -> Result<ApiResponse<Vec<SubmissionResult>>, GatewayError> {
        self.register(AttendanceKind::CheckOut, request).await
    }

    /// Reachability probe, never fails
    pub async fn health_check(&self) -> bool {
        self.transport.health_check().await
    }
}
