//! Declaration builder
//!
//! Turns a [`WorkingConfig`] into ready-to-post declarations. Tenants are
//! removed from the appliance by naming them with an empty body, never by
//! leaving them out: the appliance only touches the tenants a document
//! names.

use adcsync_types::{
    is_envelope_key, tenant_stub, Declaration, TenantMap, VersionInfo, CLASS_KEY, TENANT_CLASS,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::collaborators::OverlayMerger;
use crate::config::DeclarationSettings;
use crate::state::{ActiveState, WorkingConfig};

/// Fixed declaration id; a stable id keeps equal inputs byte-identical
pub const DECLARATION_ID: &str = "urn:uuid:2d1a8c56-4e7b-4f0a-9b3e-6c0f5d8a1e24";

pub const DECLARATION_LABEL: &str = "adcsync declaration";

pub const DECLARATION_REMARK: &str = "Auto-generated by adcsync";

/// Builds declarations stamped with the negotiated version
pub struct DeclarationBuilder {
    version: VersionInfo,
    settings: DeclarationSettings,
    overlay: Arc<dyn OverlayMerger>,
}

impl DeclarationBuilder {
    pub fn new(
        version: VersionInfo,
        settings: DeclarationSettings,
        overlay: Arc<dyn OverlayMerger>,
    ) -> Self {
        Self {
            version,
            settings,
            overlay,
        }
    }

    pub fn version(&self) -> &VersionInfo {
        &self.version
    }

    /// Re-stamp after a reconnect negotiated a different version
    pub fn set_version(&mut self, version: VersionInfo) {
        self.version = version;
    }

    pub fn settings(&self) -> &DeclarationSettings {
        &self.settings
    }

    /// Envelope with no tenants
    pub fn build_envelope(&self) -> Declaration {
        self.envelope_with(TenantMap::new())
    }

    fn envelope_with(&self, tenants: TenantMap) -> Declaration {
        let mut body = Map::new();
        body.insert(CLASS_KEY.to_string(), json!("ADC"));
        body.insert("schemaVersion".to_string(), json!(self.version.schema_version));
        body.insert("id".to_string(), json!(DECLARATION_ID));
        body.insert("label".to_string(), json!(DECLARATION_LABEL));
        body.insert("remark".to_string(), json!(DECLARATION_REMARK));
        body.insert(
            "controls".to_string(),
            json!({ "class": "Controls", "userAgent": self.settings.user_agent }),
        );
        for (name, tenant) in tenants {
            if is_envelope_key(&name) {
                warn!(tenant = %name, "Skipping tenant named after an envelope field");
                continue;
            }
            body.insert(name, tenant);
        }

        Declaration::from_value(json!({
            "$schema": format!(
                "{}/{}/as3-schema-{}.json",
                self.settings.schema_base_url.trim_end_matches('/'),
                self.version.version,
                self.version.release
            ),
            "class": "AS3",
            "declaration": Value::Object(body),
        }))
    }

    /// Merge resource and configmap fragments into one declaration.
    ///
    /// Tenants applied last time but absent now are written as deletion
    /// stubs. The result is cached on `working`.
    pub fn merge_unified(&self, working: &mut WorkingConfig, active: &ActiveState) -> Declaration {
        let mut tenants: TenantMap = working.resources.clone();
        for cm in &working.configmaps {
            for (name, body) in &cm.tenants {
                tenants.insert(name.clone(), body.clone());
            }
        }

        for tenant in active.deleted_from_declaration(&tenants) {
            debug!(tenant = %tenant, "Retracting tenant");
            tenants.insert(tenant, tenant_stub());
        }

        let mut declaration = self.unified_with(tenants);
        if let Some(overlay) = &working.override_overlay {
            match self.overlay.merge(overlay, &declaration) {
                Some(overridden) => declaration = overridden,
                None => warn!("Failed to apply override overlay; using merged declaration"),
            }
        }

        working.unified = Some(declaration.clone());
        declaration
    }

    /// Unified declaration of an empty tenant set
    pub fn build_empty_unified(&self) -> Declaration {
        self.unified_with(TenantMap::new())
    }

    fn unified_with(&self, tenants: TenantMap) -> Declaration {
        let mut declaration = self.envelope_with(tenants);
        if let Some(level) = &self.settings.log_level {
            declaration.set_top_level("logLevel", json!(level));
        }
        if let Some(persist) = self.settings.persist {
            declaration.set_top_level("persist", json!(persist));
        }
        declaration
    }

    /// Declaration carrying only one tenant of the working tenant map
    pub fn build_per_tenant(&self, working: &WorkingConfig, tenant: &str) -> Declaration {
        let tenants = working
            .tenant_map
            .get(tenant)
            .map(|body| TenantMap::from([(tenant.to_string(), body.clone())]))
            .unwrap_or_default();
        self.envelope_with(tenants)
    }

    /// Declaration retracting one partition.
    ///
    /// A `managed` partition is reset to the default tenant skeleton instead
    /// of being emptied.
    pub fn build_empty_tenant(&self, partition: &str, managed: bool) -> Declaration {
        let mut tenants = TenantMap::new();
        if !partition.is_empty() {
            let body = if managed {
                self.managed_skeleton()
            } else {
                tenant_stub()
            };
            tenants.insert(partition.to_string(), body);
        }
        self.envelope_with(tenants)
    }

    /// Declaration retracting every named partition at once
    pub fn build_tenant_stubs(&self, partitions: &[String]) -> Declaration {
        self.envelope_with(
            partitions
                .iter()
                .filter(|partition| !partition.is_empty())
                .map(|partition| (partition.clone(), tenant_stub()))
                .collect(),
        )
    }

    fn managed_skeleton(&self) -> Value {
        json!({
            CLASS_KEY: TENANT_CLASS,
            "defaultRouteDomain": self.settings.default_route_domain,
            "Shared": { "class": "Application", "template": "shared" },
        })
    }
}
