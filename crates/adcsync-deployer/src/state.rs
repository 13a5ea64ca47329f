//! Per-cycle working config and the last-applied active state

use adcsync_types::{ConfigMapSource, Declaration, TenantMap, WorkRequest};
use serde_json::Value;
use std::collections::BTreeSet;

/// Desired configuration of one reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingConfig {
    /// Resource-derived fragments
    pub resources: TenantMap,

    /// User config sources, in merge order
    pub configmaps: Vec<ConfigMapSource>,

    /// Raw override overlay text
    pub override_overlay: Option<String>,

    /// Flattened configmap fragments; later sources win
    pub tenant_map: TenantMap,

    /// Cached result of the unified merge
    pub unified: Option<Declaration>,
}

impl WorkingConfig {
    pub fn from_request(request: &WorkRequest) -> Self {
        let mut working = Self {
            resources: request.resources.clone(),
            configmaps: request.configmaps.clone(),
            override_overlay: request
                .override_overlay
                .clone()
                .filter(|overlay| !overlay.trim().is_empty()),
            tenant_map: TenantMap::new(),
            unified: None,
        };
        working.flatten_tenants();
        working
    }

    fn flatten_tenants(&mut self) {
        self.tenant_map = self
            .configmaps
            .iter()
            .flat_map(|cm| cm.tenants.iter())
            .map(|(name, body)| (name.clone(), body.clone()))
            .collect();
    }

    /// True only if the effective fragment came from a validated source
    pub fn tenant_is_valid(&self, tenant: &str) -> bool {
        self.configmaps
            .iter()
            .rev()
            .find(|cm| cm.declares(tenant))
            .map(|cm| cm.validated)
            .unwrap_or(false)
    }

    /// Drop fragments that may never be posted on their own
    pub fn retain_valid_tenants(&mut self) {
        let invalid: Vec<String> = self
            .tenant_map
            .keys()
            .filter(|tenant| !self.tenant_is_valid(tenant))
            .cloned()
            .collect();
        for tenant in invalid {
            self.tenant_map.remove(&tenant);
        }
    }
}

/// What was last confirmed applied on the appliance.
///
/// Owned by the deployer loop and replaced wholesale after a non-retryable
/// outcome; a failed cycle never touches it. With no tenants applied the
/// declaration is the bare envelope the state was seeded with.
#[derive(Debug, Clone, Default)]
pub struct ActiveState {
    envelope: Declaration,
    declaration: Declaration,
    tenant_map: TenantMap,
    resources: TenantMap,
    configmaps: Vec<ConfigMapSource>,
    override_overlay: Option<String>,
}

impl ActiveState {
    /// Unseeded state; the declaration stays `{}` until the first update
    pub fn new() -> Self {
        Self::default()
    }

    /// State holding only `envelope`, the declaration of an empty tenant set
    pub fn seeded(envelope: Declaration) -> Self {
        Self {
            declaration: envelope.clone(),
            envelope,
            ..Self::default()
        }
    }

    /// Replace every tracked field with the given working config
    pub fn update(&mut self, working: WorkingConfig) {
        self.declaration = working
            .unified
            .unwrap_or_else(|| self.envelope.clone());
        self.tenant_map = working.tenant_map;
        self.resources = working.resources;
        self.configmaps = working.configmaps;
        self.override_overlay = working.override_overlay;
    }

    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    pub fn tenant_map(&self) -> &TenantMap {
        &self.tenant_map
    }

    pub fn tenant(&self, name: &str) -> Option<&Value> {
        self.tenant_map.get(name)
    }

    pub fn resources(&self) -> &TenantMap {
        &self.resources
    }

    pub fn configmaps(&self) -> &[ConfigMapSource] {
        &self.configmaps
    }

    pub fn override_overlay(&self) -> Option<&str> {
        self.override_overlay.as_deref()
    }

    /// Tracked tenants missing from `current`, in sorted order
    pub fn deleted_tenants(&self, current: &TenantMap) -> Vec<String> {
        self.tenant_map
            .keys()
            .filter(|tenant| !current.contains_key(*tenant))
            .cloned()
            .collect()
    }

    /// Tenants of the applied declaration missing from `current`
    pub fn deleted_from_declaration(&self, current: &TenantMap) -> Vec<String> {
        self.declaration
            .tenants()
            .into_iter()
            .filter(|tenant| !current.contains_key(tenant))
            .collect()
    }

    /// Every tenant confirmed applied, from either posting mode
    pub fn applied_tenants(&self) -> Vec<String> {
        let mut tenants: BTreeSet<String> = self.declaration.tenants().into_iter().collect();
        tenants.extend(self.tenant_map.keys().cloned());
        tenants.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adcsync_types::TriggerEvent;
    use proptest::collection::btree_set;
    use proptest::prelude::*;
    use serde_json::json;

    fn tenant(marker: &str) -> Value {
        json!({ "class": "Tenant", "marker": marker })
    }

    #[test]
    fn test_later_configmap_wins_and_decides_validity() {
        let request = WorkRequest::new(TriggerEvent::ConfigMapChanged)
            .with_configmap(
                ConfigMapSource::new("ns", "first")
                    .with_tenant("alpha", tenant("first"))
                    .validated(true),
            )
            .with_configmap(
                ConfigMapSource::new("ns", "second")
                    .with_tenant("alpha", tenant("second"))
                    .with_tenant("beta", tenant("second")),
            );

        let working = WorkingConfig::from_request(&request);
        assert_eq!(working.tenant_map["alpha"], tenant("second"));
        assert!(!working.tenant_is_valid("alpha"));
        assert!(!working.tenant_is_valid("beta"));
        assert!(!working.tenant_is_valid("missing"));
    }

    #[test]
    fn test_resources_are_not_flattened_into_tenant_map() {
        let request =
            WorkRequest::new(TriggerEvent::ResourceChanged).with_resource("alpha", tenant("r"));
        let working = WorkingConfig::from_request(&request);
        assert!(working.tenant_map.is_empty());
        assert_eq!(working.resources.len(), 1);
    }

    #[test]
    fn test_blank_overlay_is_ignored() {
        let request = WorkRequest::new(TriggerEvent::Resync).with_override("   ");
        assert!(WorkingConfig::from_request(&request).override_overlay.is_none());
    }

    #[test]
    fn test_retain_valid_tenants() {
        let request = WorkRequest::new(TriggerEvent::ConfigMapChanged)
            .with_configmap(
                ConfigMapSource::new("ns", "good")
                    .with_tenant("alpha", tenant("a"))
                    .validated(true),
            )
            .with_configmap(ConfigMapSource::new("ns", "bad").with_tenant("beta", tenant("b")));

        let mut working = WorkingConfig::from_request(&request);
        working.retain_valid_tenants();
        assert_eq!(working.tenant_map.keys().collect::<Vec<_>>(), vec!["alpha"]);
    }

    #[test]
    fn test_deleted_tenants_is_set_difference() {
        let mut active = ActiveState::new();
        let mut working = WorkingConfig::default();
        working.tenant_map.insert("a".into(), tenant("a"));
        working.tenant_map.insert("b".into(), tenant("b"));
        active.update(working);

        let mut current = TenantMap::new();
        current.insert("b".into(), tenant("b"));
        current.insert("c".into(), tenant("c"));

        assert_eq!(active.deleted_tenants(&current), vec!["a".to_string()]);
        assert!(active.deleted_tenants(active.tenant_map()).is_empty());
    }

    #[test]
    fn test_update_replaces_wholesale() {
        let mut active = ActiveState::new();
        let mut first = WorkingConfig::default();
        first.tenant_map.insert("a".into(), tenant("a"));
        first.override_overlay = Some("{}".into());
        active.update(first);

        active.update(WorkingConfig::default());
        assert!(active.tenant_map().is_empty());
        assert!(active.override_overlay().is_none());
        assert_eq!(active.declaration().render(), "{}");
    }

    #[test]
    fn test_seeded_state_falls_back_to_envelope() {
        let envelope =
            Declaration::from_value(json!({ "class": "AS3", "declaration": { "class": "ADC" } }));
        let mut active = ActiveState::seeded(envelope.clone());
        assert!(active.declaration().same_as(&envelope));
        assert!(active.applied_tenants().is_empty());

        let mut working = WorkingConfig::default();
        working.tenant_map.insert("a".into(), tenant("a"));
        active.update(working);
        assert!(active.declaration().same_as(&envelope));
        assert_eq!(active.applied_tenants(), vec!["a".to_string()]);

        active.update(WorkingConfig::default());
        assert!(active.declaration().same_as(&envelope));
        assert!(active.tenant_map().is_empty());
    }

    proptest! {
        #[test]
        fn property_deleted_tenants_is_set_difference(
            applied in btree_set("[a-f]{1,3}", 0..8),
            current in btree_set("[a-f]{1,3}", 0..8),
        ) {
            let mut active = ActiveState::new();
            let mut working = WorkingConfig::default();
            for name in &applied {
                working.tenant_map.insert(name.clone(), tenant(name));
            }
            active.update(working);

            let current_map: TenantMap = current
                .iter()
                .map(|name| (name.clone(), tenant(name)))
                .collect();
            let expected: Vec<String> = applied.difference(&current).cloned().collect();
            prop_assert_eq!(active.deleted_tenants(&current_map), expected);
        }
    }
}

