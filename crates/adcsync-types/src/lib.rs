//! adcsync Types - Core types for declaration synchronization
//!
//! adcsync keeps a remote application delivery controller (ADC) converged on a
//! locally computed, tenant-keyed configuration. This crate holds the data
//! model shared by the deployer loop and the daemon around it.
//!
//! ## Key Concepts
//!
//! - **Declaration**: The full document sent to the appliance (envelope + tenants)
//! - **Tenant fragment**: One tenant's configuration subtree before merging
//! - **ConfigMapSource**: A user-supplied group of fragments, tagged as validated or not
//! - **ResponseCode**: Fixed taxonomy of transport outcomes
//! - **WorkRequest**: One desired-state update fed to the deployer loop

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod declaration;
pub mod error;
pub mod request;
pub mod response;
pub mod tenant;
pub mod version;

// Re-export main types
pub use declaration::{
    is_envelope_key, is_tenant_stub, tenant_stub, Declaration, CLASS_KEY, DECLARATION_KEY,
    ENVELOPE_KEYS, TENANT_CLASS,
};
pub use error::{Result, TypesError};
pub use request::{
    DeployerResponse, DeployerStatus, NetworkingSnapshot, RequestId, TriggerEvent, WorkRequest,
};
pub use response::{PostOutcome, ResponseCode};
pub use tenant::{ConfigMapSource, PoolMember, TenantMap};
pub use version::{ApplianceVersion, ProductVersion, VersionInfo};
