//! Messages flowing into and out of the deployer loop

use crate::response::ResponseCode;
use crate::tenant::{ConfigMapSource, PoolMember, TenantMap};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a work request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// What caused a work request to be queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    /// A watched cluster resource changed
    #[default]
    ResourceChanged,
    /// A user config source changed
    ConfigMapChanged,
    /// Periodic full resync
    Resync,
    /// First reconciliation after start-up
    Startup,
}

/// One desired-state update for the deployer loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRequest {
    #[serde(default)]
    pub id: RequestId,

    #[serde(default)]
    pub event: TriggerEvent,

    /// Resource-derived tenant fragments (authoritative set)
    #[serde(default)]
    pub resources: TenantMap,

    /// User config sources, merged after resources in this order
    #[serde(default)]
    pub configmaps: Vec<ConfigMapSource>,

    /// Raw overlay text applied over the merged declaration
    #[serde(default)]
    pub override_overlay: Option<String>,

    /// Pool members of the resource-derived fragments
    #[serde(default)]
    pub members: Vec<PoolMember>,

    #[serde(default = "chrono::Utc::now")]
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl WorkRequest {
    pub fn new(event: TriggerEvent) -> Self {
        Self {
            id: RequestId::generate(),
            event,
            resources: TenantMap::new(),
            configmaps: Vec::new(),
            override_overlay: None,
            members: Vec::new(),
            received_at: chrono::Utc::now(),
        }
    }

    pub fn with_resource(mut self, tenant: impl Into<String>, body: serde_json::Value) -> Self {
        self.resources.insert(tenant.into(), body);
        self
    }

    pub fn with_configmap(mut self, source: ConfigMapSource) -> Self {
        self.configmaps.push(source);
        self
    }

    pub fn with_override(mut self, overlay: impl Into<String>) -> Self {
        self.override_overlay = Some(overlay.into());
        self
    }

    pub fn with_member(mut self, member: PoolMember) -> Self {
        self.members.push(member);
        self
    }
}

/// Networking facts derived from the request last applied or attempted
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkingSnapshot {
    pub request_id: Option<RequestId>,

    /// Sorted, de-duplicated pool members
    pub members: Vec<PoolMember>,
}

impl NetworkingSnapshot {
    pub fn from_request(request: &WorkRequest) -> Self {
        let mut members: Vec<PoolMember> = request
            .members
            .iter()
            .chain(request.configmaps.iter().flat_map(|cm| cm.endpoints.iter()))
            .cloned()
            .collect();
        members.sort();
        members.dedup();

        Self {
            request_id: Some(request.id.clone()),
            members,
        }
    }
}

/// Notification sent to the response consumer after every attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployerResponse {
    pub snapshot: NetworkingSnapshot,
    pub success: bool,
    pub code: ResponseCode,
}

/// Read-only view of the deployer loop published to other components
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeployerStatus {
    /// Failing but still retrying, or last document rejected by validation
    pub degraded: bool,

    pub last_code: Option<ResponseCode>,

    /// Tenants currently held in the failure ledger
    pub failed_tenants: Vec<String>,

    /// Tenants confirmed applied
    pub applied_tenants: Vec<String>,

    pub attempts: u64,

    pub last_attempt_at: Option<chrono::DateTime<chrono::Utc>>,
}
