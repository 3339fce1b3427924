//! Backend collaborator that stores schedules, routes and directories
//!
//! HTTP in production, in-memory mock for tests and local runs.

mod http;

pub use http::{BackendConfig, HttpBackend};

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::BackendError;
use crate::types::{
    CreateRouteRequest, CreatedRoute, Driver, PersistedRoute, PersistedStop, ReorderRouteRequest,
    UnassignedSchedule, Vehicle,
};

/// Read snapshots and write finished plans
#[async_trait]
pub trait TransportBackend: Send + Sync {
    async fn unassigned_schedules(&self, date: NaiveDate) -> Result<Vec<UnassignedSchedule>, BackendError>;

    async fn routes(&self, date: NaiveDate) -> Result<Vec<PersistedRoute>, BackendError>;

    async fn vehicles(&self) -> Result<Vec<Vehicle>, BackendError>;

    async fn drivers(&self) -> Result<Vec<Driver>, BackendError>;

    async fn create_route(&self, request: &CreateRouteRequest) -> Result<CreatedRoute, BackendError>;

    async fn reorder_route(&self, request: &ReorderRouteRequest) -> Result<(), BackendError>;

    /// Service name for logging
    fn name(&self) -> &str;
}

#[derive(Debug, Default)]
struct MockState {
    schedules: Vec<UnassignedSchedule>,
    routes: Vec<PersistedRoute>,
    vehicles: Vec<Vehicle>,
    drivers: Vec<Driver>,
    created: Vec<CreateRouteRequest>,
    reorders: Vec<ReorderRouteRequest>,
    failing_plans: HashSet<String>,
    fail_reorders: bool,
    fail_reads: bool,
}

/// In-memory backend with failure injection
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedules(self, schedules: Vec<UnassignedSchedule>) -> Self {
        self.state.lock().schedules = schedules;
        self
    }

    pub fn with_routes(self, routes: Vec<PersistedRoute>) -> Self {
        self.state.lock().routes = routes;
        self
    }

    pub fn with_vehicles(self, vehicles: Vec<Vehicle>) -> Self {
        self.state.lock().vehicles = vehicles;
        self
    }

    pub fn with_drivers(self, drivers: Vec<Driver>) -> Self {
        self.state.lock().drivers = drivers;
        self
    }

    /// Refuse to create the route for plans with this name
    pub fn fail_create_for(self, plan_name: impl Into<String>) -> Self {
        self.state.lock().failing_plans.insert(plan_name.into());
        self
    }

    pub fn set_fail_reorders(&self, fail: bool) {
        self.state.lock().fail_reorders = fail;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Creation requests received so far
    pub fn created(&self) -> Vec<CreateRouteRequest> {
        self.state.lock().created.clone()
    }

    pub fn reorders(&self) -> Vec<ReorderRouteRequest> {
        self.state.lock().reorders.clone()
    }

    fn check_reads(&self) -> Result<(), BackendError> {
        if self.state.lock().fail_reads {
            return Err(BackendError::Unavailable("mock reads disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TransportBackend for MockBackend {
    async fn unassigned_schedules(&self, _date: NaiveDate) -> Result<Vec<UnassignedSchedule>, BackendError> {
        self.check_reads()?;
        Ok(self.state.lock().schedules.clone())
    }

    async fn routes(&self, date: NaiveDate) -> Result<Vec<PersistedRoute>, BackendError> {
        self.check_reads()?;
        Ok(self
            .state
            .lock()
            .routes
            .iter()
            .filter(|r| r.date == date)
            .cloned()
            .collect())
    }

    async fn vehicles(&self) -> Result<Vec<Vehicle>, BackendError> {
        self.check_reads()?;
        Ok(self.state.lock().vehicles.clone())
    }

    async fn drivers(&self) -> Result<Vec<Driver>, BackendError> {
        self.check_reads()?;
        Ok(self.state.lock().drivers.clone())
    }

    async fn create_route(&self, request: &CreateRouteRequest) -> Result<CreatedRoute, BackendError> {
        let mut state = self.state.lock();
        if state.failing_plans.contains(&request.name) {
            return Err(BackendError::Status {
                status: 500,
                body: format!("could not store route '{}'", request.name),
            });
        }
        state.created.push(request.clone());

        Ok(CreatedRoute {
            id: Uuid::new_v4(),
            stops: request
                .stops
                .iter()
                .map(|s| PersistedStop {
                    id: Uuid::new_v4(),
                    kind: s.kind,
                    child_id: s.child_id,
                    child_name: String::new(),
                    schedule_id: s.schedule_id,
                    position: s.position,
                    time: s.time,
                })
                .collect(),
        })
    }

    async fn reorder_route(&self, request: &ReorderRouteRequest) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if state.fail_reorders {
            return Err(BackendError::Status {
                status: 409,
                body: format!("route {} changed concurrently", request.route_id),
            });
        }
        state.reorders.push(request.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "MockBackend"
    }
}

/// HTTP backend when configured, otherwise the in-memory mock
pub fn create_backend_with_fallback(config: Option<BackendConfig>) -> Box<dyn TransportBackend> {
    if let Some(config) = config {
        let base_url = config.base_url.clone();
        match HttpBackend::new(config) {
            Ok(backend) => {
                info!("Using backend at {}", base_url);
                return Box::new(backend);
            }
            Err(e) => {
                warn!("Cannot build HTTP client for {}: {}. Falling back to mock backend.", base_url, e);
            }
        }
    } else {
        warn!("BACKEND_URL not set, using in-memory mock backend (nothing is persisted)");
    }

    Box::new(MockBackend::new())
}
