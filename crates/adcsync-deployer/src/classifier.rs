//! Response aggregation and the per-tenant failure ledger

use adcsync_types::{Declaration, ResponseCode};
use std::collections::BTreeMap;
use tracing::debug;

/// Counts of classified outcomes within one batch of posts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTally {
    counts: [usize; ResponseCode::PRECEDENCE.len()],
}

impl ResponseTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, code: ResponseCode) {
        self.counts[code as usize] += 1;
    }

    pub fn count(&self, code: ResponseCode) -> usize {
        self.counts[code as usize]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Fold the batch into one decision.
    ///
    /// The first code in precedence order with a non-zero count is the
    /// representative one, so a single unavailable response fails the whole
    /// batch. An empty tally counts as a generic failure.
    pub fn aggregate(&self) -> (bool, ResponseCode) {
        ResponseCode::PRECEDENCE
            .into_iter()
            .find(|code| self.count(*code) > 0)
            .map(|code| (!code.is_retryable(), code))
            .unwrap_or((false, ResponseCode::CommonError))
    }
}

impl FromIterator<ResponseCode> for ResponseTally {
    fn from_iter<I: IntoIterator<Item = ResponseCode>>(iter: I) -> Self {
        let mut tally = Self::new();
        tally.extend(iter);
        tally
    }
}

impl Extend<ResponseCode> for ResponseTally {
    fn extend<I: IntoIterator<Item = ResponseCode>>(&mut self, iter: I) {
        for code in iter {
            self.record(code);
        }
    }
}

/// Last declaration that failed to apply, per tenant
#[derive(Debug, Clone, Default)]
pub struct FailureLedger {
    failed: BTreeMap<String, Declaration>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Book one tenant outcome.
    ///
    /// Ok and UnprocessableEntity settle the tenant; every other code keeps
    /// the outgoing declaration for an exact replay later.
    pub fn record(&mut self, tenant: &str, code: ResponseCode, declaration: &Declaration) {
        if code.settles_failure() {
            if self.failed.remove(tenant).is_some() {
                debug!(tenant = %tenant, code = %code, "Cleared failed tenant");
            }
        } else {
            debug!(tenant = %tenant, code = %code, "Recorded failed tenant");
            self.failed.insert(tenant.to_string(), declaration.clone());
        }
    }

    /// Forget every failed tenant rejected by `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.failed.retain(|tenant, _| {
            let kept = keep(tenant);
            if !kept {
                debug!(tenant = %tenant, "Dropped superseded failure");
            }
            kept
        });
    }

    pub fn get(&self, tenant: &str) -> Option<&Declaration> {
        self.failed.get(tenant)
    }

    pub fn contains(&self, tenant: &str) -> bool {
        self.failed.contains_key(tenant)
    }

    pub fn len(&self) -> usize {
        self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn tenants(&self) -> Vec<String> {
        self.failed.keys().cloned().collect()
    }

    /// Owned copy of every entry, for replay while the ledger is updated
    pub fn entries(&self) -> Vec<(String, Declaration)> {
        self.failed
            .iter()
            .map(|(tenant, decl)| (tenant.clone(), decl.clone()))
            .collect()
    }
}
