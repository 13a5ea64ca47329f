//! Declaration documents
//!
//! A declaration is the JSON document posted to the appliance. Tenants live
//! inside the `declaration` object next to the fixed ADC envelope fields
//! (`class`, `schemaVersion`, `controls`, ...). Object keys are kept sorted,
//! so two equal documents always render to the same bytes.

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Key of the object holding the ADC envelope and the tenants
pub const DECLARATION_KEY: &str = "declaration";

/// Key carrying an object's class
pub const CLASS_KEY: &str = "class";

/// Class value marking a tenant object
pub const TENANT_CLASS: &str = "Tenant";

/// Envelope fields sharing the `declaration` object with the tenants
pub const ENVELOPE_KEYS: [&str; 6] = [
    CLASS_KEY,
    "schemaVersion",
    "id",
    "label",
    "remark",
    "controls",
];

/// True if a tenant called `name` would clobber an envelope field
pub fn is_envelope_key(name: &str) -> bool {
    ENVELOPE_KEYS.contains(&name)
}

/// Body that retracts every object of a tenant on the appliance
pub fn tenant_stub() -> Value {
    json!({ CLASS_KEY: TENANT_CLASS })
}

/// A complete declaration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Declaration(Value);

impl Default for Declaration {
    /// An empty object: valid JSON with no envelope and no tenants.
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl Declaration {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Parse a declaration from its JSON text
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self(serde_json::from_str(text)?))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Render to compact JSON text
    pub fn render(&self) -> String {
        self.0.to_string()
    }

    /// Byte-level equality of the rendered documents
    pub fn same_as(&self, other: &Declaration) -> bool {
        self.render() == other.render()
    }

    /// The `declaration` object holding envelope fields and tenants
    pub fn body(&self) -> Option<&Map<String, Value>> {
        self.0.get(DECLARATION_KEY).and_then(Value::as_object)
    }

    pub fn body_mut(&mut self) -> Result<&mut Map<String, Value>> {
        self.0
            .get_mut(DECLARATION_KEY)
            .and_then(Value::as_object_mut)
            .ok_or(TypesError::MissingDeclarationBody(DECLARATION_KEY))
    }

    /// Set a top-level field (outside the `declaration` object)
    pub fn set_top_level(&mut self, key: &str, value: Value) {
        if let Value::Object(map) = &mut self.0 {
            map.insert(key.to_string(), value);
        }
    }

    /// Insert or replace a tenant body
    pub fn insert_tenant(&mut self, name: &str, body: Value) -> Result<()> {
        self.body_mut()?.insert(name.to_string(), body);
        Ok(())
    }

    pub fn tenant(&self, name: &str) -> Option<&Value> {
        self.body()
            .and_then(|body| body.get(name))
            .filter(|value| is_tenant(value))
    }

    /// Names of tenants carrying configuration, in sorted order.
    ///
    /// Deletion stubs are skipped: a stub already retracted its tenant, so
    /// it must not be retracted again on the next cycle.
    pub fn tenants(&self) -> Vec<String> {
        self.tenant_names(false)
    }

    /// Names of every tenant object, optionally including deletion stubs
    pub fn tenant_names(&self, include_stubs: bool) -> Vec<String> {
        self.body()
            .map(|body| {
                body.iter()
                    .filter(|(_, value)| is_tenant(value))
                    .filter(|(_, value)| include_stubs || !is_tenant_stub(value))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_tenant(value: &Value) -> bool {
    value.get(CLASS_KEY).and_then(Value::as_str) == Some(TENANT_CLASS)
}

/// True for a tenant body that holds nothing but its class
pub fn is_tenant_stub(value: &Value) -> bool {
    is_tenant(value) && value.as_object().map(Map::len) == Some(1)
}
