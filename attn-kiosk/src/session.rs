//! Check-in/check-out session
//!
//! Holds the state of one kiosk interaction (role, action, site, crew,
//! worker roster, photo) and is the boundary where every failure becomes a
//! single notification on the [`EventBus`]. Validation runs before any
//! network call. The session is driven through `&mut self`, so only one
//! submission can be in flight per session.

use crate::capture::{CaptureState, CapturePipeline, CapturedPhoto};
use crate::error::{KioskError, ValidationError};
use crate::gateway::RemoteGateway;
use crate::geolocation::{self, LocationProvider};
use crate::preferences::PreferenceStore;
use crate::reconciler::{self, Reconciliation};
use attn_common::events::{EventBus, KioskEvent, ToastLevel};
use attn_common::messages;
use attn_common::models::{AttendanceKind, Crew, Role, Site, SubmissionRequest, WorkerRecord};
use attn_common::{KioskConfig, WorkerId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ordered worker list, unique by id, bounded by role
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRoster {
    workers: Vec<WorkerRecord>,
    capacity: usize,
}

impl WorkerRoster {
    pub fn new(capacity: usize) -> Self {
        Self {
            workers: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn workers(&self) -> &[WorkerRecord] {
        &self.workers
    }

    pub fn contains(&self, id: &WorkerId) -> bool {
        self.workers.iter().any(|w| &w.id == id)
    }

    pub fn add(&mut self, worker: WorkerRecord) -> Result<(), ValidationError> {
        if self.contains(&worker.id) {
            return Err(ValidationError::DuplicateWorker(worker.id));
        }
        if self.workers.len() >= self.capacity {
            return Err(ValidationError::RosterFull { max: self.capacity });
        }
        self.workers.push(worker);
        Ok(())
    }

    /// Add every worker not already present, up to capacity
    ///
    /// Returns how many were added.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = WorkerRecord>) -> usize {
        let mut added = 0;
        for worker in incoming {
            match self.add(worker) {
                Ok(()) => added += 1,
                Err(ValidationError::RosterFull { max }) => {
                    warn!(max, "Roster full, remaining pending workers skipped");
                    break;
                }
                Err(_) => {}
            }
        }
        added
    }

    pub fn remove(&mut self, index: usize) -> Option<WorkerRecord> {
        (index < self.workers.len()).then(|| self.workers.remove(index))
    }

    pub fn clear(&mut self) {
        self.workers.clear();
    }
}

/// Collaborators a session is built from
pub struct SessionParts {
    pub config: Arc<KioskConfig>,
    pub gateway: RemoteGateway,
    pub camera: CapturePipeline,
    pub events: Arc<EventBus>,
    pub preferences: PreferenceStore,
    pub location: Arc<dyn LocationProvider>,
}

/// One kiosk interaction
pub struct KioskSession {
    config: Arc<KioskConfig>,
    gateway: RemoteGateway,
    camera: CapturePipeline,
    events: Arc<EventBus>,
    preferences: PreferenceStore,
    location: Arc<dyn LocationProvider>,

    role: Option<Role>,
    kind: Option<AttendanceKind>,
    site: Option<Site>,
    crew: Option<String>,
    area: Option<String>,
    roster: WorkerRoster,
    looked_up: Option<WorkerRecord>,
    sites: Option<Vec<Site>>,
}

impl KioskSession {
    pub fn new(parts: SessionParts) -> Self {
        let capacity = parts.config.validation.max_workers_administrative;
        Self {
            config: parts.config,
            gateway: parts.gateway,
            camera: parts.camera,
            events: parts.events,
            preferences: parts.preferences,
            location: parts.location,
            role: None,
            kind: None,
            site: None,
            crew: None,
            area: None,
            roster: WorkerRoster::new(capacity),
            looked_up: None,
            sites: None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn kind(&self) -> Option<AttendanceKind> {
        self.kind
    }

    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    pub fn crew(&self) -> Option<&str> {
        self.crew.as_deref()
    }

    pub fn area(&self) -> Option<&str> {
        self.area.as_deref()
    }

    pub fn roster(&self) -> &WorkerRoster {
        &self.roster
    }

    pub fn looked_up(&self) -> Option<&WorkerRecord> {
        self.looked_up.as_ref()
    }

    pub fn camera_state(&self) -> CaptureState {
        self.camera.state()
    }

    pub fn photo(&self) -> Option<&CapturedPhoto> {
        self.camera.photo()
    }

    /// Log the detail, notify the user, hand the error back
    fn fail<T>(&self, err: KioskError) -> Result<T, KioskError> {
        match &err {
            KioskError::Validation(e) => debug!("Validation failed: {}", e),
            other => warn!("{}", other),
        }
        self.events.toast(ToastLevel::Error, err.user_message());
        Err(err)
    }

    /// Pick role and action; starts a fresh form
    pub fn begin(&mut self, role: Role, kind: AttendanceKind) {
        info!(?role, ?kind, "Session started");
        self.role = Some(role);
        self.kind = Some(kind);
        self.site = None;
        self.crew = None;
        self.area = None;

        let capacity = match role {
            Role::Operational => self.config.validation.max_workers_operational,
            Role::Administrative => self.config.validation.max_workers_administrative,
        };
        self.roster = WorkerRoster::new(capacity);
        self.reset_form();
    }

    /// Probe the API and publish the reachability
    pub async fn check_connection(&self) -> bool {
        let online = self.gateway.health_check().await;
        self.events.emit_lossy(KioskEvent::ConnectionChanged {
            online,
            timestamp: attn_common::time::now(),
        });
        online
    }

    /// Fetch (once) the site list and pre-select the last used site
    pub async fn load_sites(&mut self) -> Result<Vec<Site>, KioskError> {
        if self.sites.is_none() {
            let response = match self.gateway.list_sites().await {
                Ok(response) => response,
                Err(e) => return self.fail(e.into()),
            };
            if !response.success {
                let message = response.message.unwrap_or_else(|| messages::GENERIC.to_string());
                return self.fail(KioskError::Remote(message));
            }
            let sites = response.data.unwrap_or_default();
            debug!(count = sites.len(), "Sites loaded");
            self.sites = Some(sites);
        }

        let sites = self.sites.clone().unwrap_or_default();

        if self.site.is_none() {
            if let Some(last) = self.preferences.last_site().await {
                if sites.contains(&last) {
                    debug!(site = %last, "Restoring last site");
                    self.select_site(&last).await?;
                }
            }
        }

        Ok(sites)
    }

    /// Forget the cached site list
    pub fn refresh(&mut self) {
        self.sites = None;
    }

    /// Select a site; an empty name clears the selection
    pub async fn select_site(&mut self, site: &str) -> Result<(), KioskError> {
        self.crew = None;
        self.area = None;

        if site.is_empty() {
            self.site = None;
            return Ok(());
        }

        self.site = Some(site.to_string());
        if let Err(e) = self.preferences.set_last_site(site).await {
            warn!("Failed to persist last site: {}", e);
        }

        if self.role == Some(Role::Operational) {
            self.load_crews().await?;
        }
        Ok(())
    }

    /// Crews of the selected site; adopts the first crew's area
    pub async fn load_crews(&mut self) -> Result<Vec<Crew>, KioskError> {
        let site = match &self.site {
            Some(site) => site.clone(),
            None => return self.fail(ValidationError::NoSite.into()),
        };

        let response = match self.gateway.list_crews(&site).await {
            Ok(response) => response,
            Err(e) => return self.fail(e.into()),
        };
        if !response.success {
            let message = response.message.unwrap_or_else(|| messages::GENERIC.to_string());
            return self.fail(KioskError::Remote(message));
        }

        let crews = response.data.unwrap_or_default();
        if let Some(first) = crews.first() {
            self.area = first.area.clone();
        }
        debug!(site = %site, count = crews.len(), area = ?self.area, "Crews loaded");
        Ok(crews)
    }

    /// Select a crew; for check-outs the crew's pending workers are merged in
    pub async fn select_crew(&mut self, crew: &str) -> Result<(), KioskError> {
        self.crew = (!crew.is_empty()).then(|| crew.to_string());

        if self.kind == Some(AttendanceKind::CheckOut) && self.crew.is_some() {
            self.load_pending().await?;
        }
        Ok(())
    }

    /// Merge workers checked in today without a check-out
    pub async fn load_pending(&mut self) -> Result<usize, KioskError> {
        let (site, crew) = match (&self.site, &self.crew) {
            (Some(site), Some(crew)) => (site.clone(), crew.clone()),
            _ => return Ok(0),
        };

        let response = match self.gateway.list_pending(&site, &crew, None).await {
            Ok(response) => response,
            Err(e) => return self.fail(e.into()),
        };

        let pending = match response.data {
            Some(pending) if response.success && !pending.is_empty() => pending,
            _ => {
                self.events.toast(ToastLevel::Info, messages::NO_PENDING);
                return Ok(0);
            }
        };

        let found = pending.len();
        let added = self.roster.merge(pending);
        debug!(found, added, "Pending workers merged");
        self.events
            .toast(ToastLevel::Success, messages::pending_loaded(found));
        Ok(added)
    }

    /// Canonicalize and look up a worker id
    pub async fn lookup_worker(&mut self, raw_id: &str) -> Result<WorkerRecord, KioskError> {
        let id = match WorkerId::parse(raw_id) {
            Ok(id) => id,
            Err(e) => return self.fail(e.into()),
        };
        if self.roster.contains(&id) {
            return self.fail(ValidationError::DuplicateWorker(id).into());
        }

        let response = match self.gateway.lookup_worker(&id).await {
            Ok(response) => response,
            Err(e) => return self.fail(e.into()),
        };

        match response.data {
            Some(worker) if response.success => {
                debug!(id = %worker.id, "Worker found");
                self.looked_up = Some(worker.clone());
                Ok(worker)
            }
            _ => {
                self.looked_up = None;
                let message = response
                    .message
                    .unwrap_or_else(|| messages::WORKER_NOT_FOUND.to_string());
                self.fail(KioskError::Remote(message))
            }
        }
    }

    /// Move the looked-up worker into the roster
    pub fn add_looked_up_worker(&mut self) -> Result<(), KioskError> {
        let worker = match &self.looked_up {
            Some(worker) => worker.clone(),
            None => return self.fail(ValidationError::NothingToAdd.into()),
        };

        if let Err(e) = self.roster.add(worker) {
            return self.fail(e.into());
        }

        self.looked_up = None;
        self.events.toast(ToastLevel::Success, messages::WORKER_ADDED);
        Ok(())
    }

    pub fn remove_worker(&mut self, index: usize) -> Option<WorkerRecord> {
        self.roster.remove(index)
    }

    pub async fn start_camera(&mut self) -> Result<(), KioskError> {
        match self.camera.start().await {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e.into()),
        }
    }

    pub async fn capture_photo(&mut self) -> Result<(), KioskError> {
        match self.camera.capture().await {
            Ok(photo) => {
                debug!(bytes = photo.size(), "Photo held for submission");
                self.events.toast(ToastLevel::Success, messages::PHOTO_CAPTURED);
                Ok(())
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// Drop the held photo and reopen the camera
    pub async fn retake_photo(&mut self) -> Result<(), KioskError> {
        self.camera.reset();
        self.start_camera().await
    }

    pub async fn switch_camera(&mut self) -> Result<(), KioskError> {
        match self.camera.switch_camera().await {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e.into()),
        }
    }

    /// Check the form is complete, without side effects
    pub fn validate(&self, observations: &str) -> Result<(), ValidationError> {
        let (role, _) = match (self.role, self.kind) {
            (Some(role), Some(kind)) => (role, kind),
            _ => return Err(ValidationError::NoMode),
        };
        if self.site.is_none() {
            return Err(ValidationError::NoSite);
        }
        if role == Role::Operational && self.crew.is_none() {
            return Err(ValidationError::NoCrew);
        }
        if self.roster.is_empty() {
            return Err(ValidationError::NoWorkers);
        }
        if !self.camera.has_photo() {
            return Err(ValidationError::NoPhoto);
        }
        let max = self.config.validation.max_observations_length;
        if observations.trim().chars().count() > max {
            return Err(ValidationError::ObservationsTooLong { max });
        }
        Ok(())
    }

    /// Submit the batch and reconcile the per-worker results
    ///
    /// The outcome is emitted on the event bus. When any worker was registered
    /// the roster and photo are cleared.
    pub async fn submit(&mut self, observations: &str) -> Result<Reconciliation, KioskError> {
        if let Err(e) = self.validate(observations) {
            return self.fail(e.into());
        }

        let (kind, request) = match self.build_request(observations).await {
            Some(built) => built,
            None => return self.fail(ValidationError::NoMode.into()),
        };
        let submitted = request.workers.len();
        info!(?kind, workers = submitted, "Submitting attendance batch");

        let response = match self.gateway.register(kind, request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Submission failed: {}", e);
                let err = KioskError::from(e);
                self.events.emit_lossy(KioskEvent::SubmissionFailed {
                    message: err.user_message(),
                });
                return Err(err);
            }
        };

        let outcome = reconciler::reconcile(response, submitted);
        self.events.emit_lossy(outcome.to_event(kind));

        if outcome.any_registered() {
            self.reset_form();
        }
        Ok(outcome)
    }

    async fn build_request(&self, observations: &str) -> Option<(AttendanceKind, SubmissionRequest)> {
        let kind = self.kind?;
        let role = self.role?;
        let site = self.site.clone()?;
        let photo = self.camera.photo()?.to_data_url();
        let coordinates = geolocation::locate(self.location.as_ref(), &self.config.geolocation).await;

        let crew = match role {
            Role::Operational => self.crew.clone(),
            Role::Administrative => None,
        };

        Some((
            kind,
            SubmissionRequest {
                workers: self.roster.workers().to_vec(),
                site,
                area: self.area.clone(),
                crew,
                photo_base64: photo,
                observations: observations.trim().to_string(),
                coordinates,
            },
        ))
    }

    /// Clear roster, pending lookup and photo; release the camera
    pub fn reset_form(&mut self) {
        self.roster.clear();
        self.looked_up = None;
        self.camera.reset();
    }

    /// Back to the start screen
    pub fn reset(&mut self) {
        self.role = None;
        self.kind = None;
        self.site = None;
        self.crew = None;
        self.area = None;
        self.reset_form();
    }
}
