//! Config deployer control loop
//!
//! A single task owns the active state and the failure ledger. Work requests
//! arrive on an unbounded channel; bursts are coalesced so only the newest
//! desired state is applied. Failed applies are retried until they succeed
//! or a newer request supersedes them.

use adcsync_types::{
    Declaration, DeployerResponse, DeployerStatus, NetworkingSnapshot, PostOutcome, ResponseCode,
    WorkRequest,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, timeout};
use tracing::{debug, info, instrument, warn};

use crate::builder::DeclarationBuilder;
use crate::classifier::{FailureLedger, ResponseTally};
use crate::collaborators::{DeclarationPoster, NetworkingNotifier};
use crate::config::DeployerConfig;
use crate::error::{DeployerError, Result};
use crate::mailbox::Mailbox;
use crate::state::{ActiveState, WorkingConfig};

/// Working config of a failed apply, kept for replay
struct PendingApply {
    working: WorkingConfig,
    snapshot: NetworkingSnapshot,
}

/// Cloneable entry point into a running deployer
#[derive(Clone)]
pub struct DeployerHandle {
    tx: mpsc::UnboundedSender<WorkRequest>,
    status: watch::Receiver<DeployerStatus>,
    responses: Mailbox<DeployerResponse>,
}

impl DeployerHandle {
    /// Queue a desired-state update
    pub fn submit(&self, request: WorkRequest) -> Result<()> {
        self.tx.send(request).map_err(|_| DeployerError::Closed)
    }

    pub fn status(&self) -> DeployerStatus {
        self.status.borrow().clone()
    }

    pub fn is_degraded(&self) -> bool {
        self.status.borrow().degraded
    }

    pub fn subscribe_status(&self) -> watch::Receiver<DeployerStatus> {
        self.status.clone()
    }

    /// Mailbox receiving one [`DeployerResponse`] per apply attempt
    pub fn responses(&self) -> &Mailbox<DeployerResponse> {
        &self.responses
    }
}

/// The control loop. Build with [`ConfigDeployer::new`], then [`spawn`](ConfigDeployer::spawn).
pub struct ConfigDeployer {
    rx: mpsc::UnboundedReceiver<WorkRequest>,
    config: DeployerConfig,
    builder: DeclarationBuilder,
    poster: Arc<dyn DeclarationPoster>,
    notifier: Arc<dyn NetworkingNotifier>,
    active: ActiveState,
    ledger: FailureLedger,
    pending: Option<PendingApply>,
    responses: Mailbox<DeployerResponse>,
    status_tx: watch::Sender<DeployerStatus>,
    degraded: bool,
    attempts: u64,
}

impl ConfigDeployer {
    pub fn new(
        config: DeployerConfig,
        builder: DeclarationBuilder,
        poster: Arc<dyn DeclarationPoster>,
        notifier: Arc<dyn NetworkingNotifier>,
    ) -> (Self, DeployerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(DeployerStatus::default());
        let responses = Mailbox::new();
        let active = ActiveState::seeded(builder.build_empty_unified());

        let deployer = Self {
            rx,
            config,
            builder,
            poster,
            notifier,
            active,
            ledger: FailureLedger::new(),
            pending: None,
            responses: responses.clone(),
            status_tx,
            degraded: false,
            attempts: 0,
        };

        let handle = DeployerHandle {
            tx,
            status: status_rx,
            responses,
        };

        (deployer, handle)
    }

    pub fn active(&self) -> &ActiveState {
        &self.active
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    /// Run the loop on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drive requests until every handle is dropped
    pub async fn run(mut self) {
        info!(
            filter_tenants = self.config.filter_tenants,
            post_delay_secs = self.config.post_delay_secs,
            "Config deployer started"
        );

        let mut first_post = true;
        while let Some(received) = self.rx.recv().await {
            let mut request = self.coalesce(received, first_post).await;
            let (mut succeeded, mut code) = self.apply_request(&request).await;

            while !succeeded {
                let wait = self.config.retry_wait(code);
                debug!(code = %code, wait_ms = wait.as_millis() as u64, "Waiting to retry");

                tokio::select! {
                    next = self.rx.recv() => match next {
                        Some(newer) => {
                            debug!(request_id = %newer.id, "Newer request supersedes retry");
                            request = newer;
                            (succeeded, code) = self.apply_request(&request).await;
                        }
                        None => {
                            info!("Request channel closed during retry");
                            return;
                        }
                    },
                    _ = time::sleep(wait) => {
                        (succeeded, code) = self.replay_failures().await;
                    }
                }
            }

            first_post = false;
        }

        info!("Config deployer stopped");
    }

    /// Apply the post delay, then keep only the newest queued request
    async fn coalesce(&mut self, mut request: WorkRequest, first_post: bool) -> WorkRequest {
        let delay = self.config.post_delay();
        if !first_post && !delay.is_zero() {
            debug!(delay_secs = delay.as_secs(), "Delaying post");
            time::sleep(delay).await;
        }

        if let Ok(Some(newer)) = timeout(self.config.coalesce_grace(), self.rx.recv()).await {
            request = newer;
        }

        let mut superseded = 0usize;
        while let Ok(newer) = self.rx.try_recv() {
            request = newer;
            superseded += 1;
        }
        if superseded > 0 {
            debug!(superseded, request_id = %request.id, "Coalesced queued requests");
        }

        request
    }

    /// One apply attempt for a request
    #[instrument(skip(self, request), fields(request_id = %request.id, event = ?request.event))]
    pub async fn apply_request(&mut self, request: &WorkRequest) -> (bool, ResponseCode) {
        let working = WorkingConfig::from_request(request);
        let snapshot = NetworkingSnapshot::from_request(request);

        let (succeeded, code) = if self.config.filter_tenants {
            self.apply_filtered(working, &snapshot).await
        } else {
            self.apply_unified(working, &snapshot).await
        };

        self.after_attempt(snapshot, succeeded, code);
        (succeeded, code)
    }

    async fn apply_unified(
        &mut self,
        mut working: WorkingConfig,
        snapshot: &NetworkingSnapshot,
    ) -> (bool, ResponseCode) {
        let declaration = self.builder.merge_unified(&mut working, &self.active);

        if declaration.same_as(self.active.declaration()) {
            debug!("Declaration unchanged, skipping post");
            self.pending = None;
            return (true, ResponseCode::Dummy);
        }

        let code = self.post_unified(&declaration).await;
        self.settle(working, snapshot, !code.is_retryable(), code)
    }

    async fn apply_filtered(
        &mut self,
        mut working: WorkingConfig,
        snapshot: &NetworkingSnapshot,
    ) -> (bool, ResponseCode) {
        let deleted = self.active.deleted_tenants(&working.tenant_map);
        let changed: Vec<String> = working
            .tenant_map
            .iter()
            .filter(|(tenant, body)| {
                working.tenant_is_valid(tenant) && self.active.tenant(tenant) != Some(*body)
            })
            .map(|(tenant, _)| tenant.clone())
            .collect();

        // Failures this request does not post again are superseded by it
        self.ledger
            .retain(|tenant| deleted.iter().chain(&changed).any(|name| name == tenant));

        let mut tally = ResponseTally::new();

        for tenant in deleted {
            let declaration = self.builder.build_empty_tenant(&tenant, false);
            tally.record(self.post_tenant(&tenant, &declaration).await);
        }

        for tenant in changed {
            let declaration = self.builder.build_per_tenant(&working, &tenant);
            tally.record(self.post_tenant(&tenant, &declaration).await);
        }

        let (succeeded, code) = if tally.is_empty() {
            (true, ResponseCode::Dummy)
        } else {
            tally.aggregate()
        };

        working.retain_valid_tenants();
        self.settle(working, snapshot, succeeded, code)
    }

    /// Retry after the backoff expired
    #[instrument(skip(self))]
    async fn replay_failures(&mut self) -> (bool, ResponseCode) {
        let (succeeded, code) = if self.config.filter_tenants {
            let mut tally = ResponseTally::new();
            for (tenant, declaration) in self.ledger.entries() {
                tally.record(self.post_tenant(&tenant, &declaration).await);
            }
            if tally.is_empty() {
                (true, ResponseCode::Dummy)
            } else {
                tally.aggregate()
            }
        } else {
            match self.pending.as_ref().and_then(|p| p.working.unified.clone()) {
                Some(declaration) => {
                    let code = self.post_unified(&declaration).await;
                    (!code.is_retryable(), code)
                }
                None => (true, ResponseCode::Dummy),
            }
        };

        let snapshot = self
            .pending
            .as_ref()
            .map(|p| p.snapshot.clone())
            .unwrap_or_default();

        if succeeded {
            if let Some(pending) = self.pending.take() {
                self.active.update(pending.working);
            }
        }

        self.after_attempt(snapshot, succeeded, code);
        (succeeded, code)
    }

    /// Commit on success, otherwise keep the working config for replay
    fn settle(
        &mut self,
        working: WorkingConfig,
        snapshot: &NetworkingSnapshot,
        succeeded: bool,
        code: ResponseCode,
    ) -> (bool, ResponseCode) {
        if succeeded {
            self.active.update(working);
            self.pending = None;
        } else {
            self.pending = Some(PendingApply {
                working,
                snapshot: snapshot.clone(),
            });
        }
        (succeeded, code)
    }

    async fn post_unified(&self, declaration: &Declaration) -> ResponseCode {
        let url = self.poster.target_url(None);
        debug!(url = %url, "Posting declaration");
        self.poster.post(declaration, &url).await.code
    }

    async fn post_tenant(&mut self, tenant: &str, declaration: &Declaration) -> ResponseCode {
        let url = self.poster.target_url(Some(&[tenant.to_string()]));
        debug!(tenant = %tenant, url = %url, "Posting tenant declaration");
        let code = self.poster.post(declaration, &url).await.code;
        self.ledger.record(tenant, code, declaration);
        code
    }

    fn after_attempt(&mut self, snapshot: NetworkingSnapshot, succeeded: bool, code: ResponseCode) {
        self.attempts += 1;

        match code {
            ResponseCode::Ok | ResponseCode::NotFound => self.degraded = false,
            ResponseCode::Dummy => {}
            ResponseCode::UnprocessableEntity
            | ResponseCode::ServiceUnavailable
            | ResponseCode::CommonError => self.degraded = true,
        }

        if succeeded {
            info!(code = %code, attempts = self.attempts, "Declaration applied");
        } else {
            warn!(
                code = %code,
                failed_tenants = self.ledger.len(),
                "Declaration apply failed, will retry"
            );
        }

        self.notifier.publish(&snapshot);
        self.responses.post(DeployerResponse {
            snapshot,
            success: succeeded,
            code,
        });

        self.status_tx.send_replace(DeployerStatus {
            degraded: self.degraded,
            last_code: Some(code),
            failed_tenants: self.failed_tenants(),
            applied_tenants: self.active.applied_tenants(),
            attempts: self.attempts,
            last_attempt_at: Some(chrono::Utc::now()),
        });
    }

    fn failed_tenants(&self) -> Vec<String> {
        if self.config.filter_tenants {
            return self.ledger.tenants();
        }
        self.pending
            .as_ref()
            .and_then(|p| p.working.unified.as_ref())
            .map(|declaration| declaration.tenant_names(true))
            .unwrap_or_default()
    }

    /// Empty a partition on the appliance
    pub async fn delete_tenant(&self, partition: &str) -> PostOutcome {
        self.post_empty_tenant(partition, false).await
    }

    /// Reset a managed partition to the default tenant skeleton
    pub async fn clean_tenant(&self, partition: &str) -> PostOutcome {
        self.post_empty_tenant(partition, true).await
    }

    async fn post_empty_tenant(&self, partition: &str, managed: bool) -> PostOutcome {
        let declaration = self.builder.build_empty_tenant(partition, managed);
        let url = self.poster.target_url(Some(&[partition.to_string()]));
        let outcome = self.poster.post(&declaration, &url).await;
        if outcome.accepted {
            info!(partition = %partition, managed, code = %outcome.code, "Partition emptied");
        } else {
            warn!(partition = %partition, managed, code = %outcome.code, "Failed to empty partition");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NoOverlay, NoopNotifier};
    use crate::config::DeclarationSettings;
    use crate::mock::MockPoster;
    use adcsync_types::{is_tenant_stub, ConfigMapSource, TriggerEvent, VersionInfo};
    use serde_json::json;

    fn deployer(
        config: DeployerConfig,
        poster: Arc<MockPoster>,
    ) -> (ConfigDeployer, DeployerHandle) {
        let builder = DeclarationBuilder::new(
            VersionInfo::new("3.45.0", "5", "3.45.0"),
            DeclarationSettings::default(),
            Arc::new(NoOverlay),
        );
        ConfigDeployer::new(config, builder, poster, Arc::new(NoopNotifier))
    }

    fn filtered() -> DeployerConfig {
        DeployerConfig {
            filter_tenants: true,
            ..Default::default()
        }
    }

    fn configmap(tenants: &[&str], validated: bool) -> WorkRequest {
        let source = tenants
            .iter()
            .fold(ConfigMapSource::new("ns", "cm"), |cm, name| {
                cm.with_tenant(*name, json!({ "class": "Tenant", "marker": name }))
            })
            .validated(validated);
        WorkRequest::new(TriggerEvent::ConfigMapChanged).with_configmap(source)
    }

    #[tokio::test]
    async fn test_unified_commit_and_unchanged_skip() {
        let poster = Arc::new(MockPoster::new());
        let (mut deployer, handle) = deployer(DeployerConfig::default(), poster.clone());
        let request = WorkRequest::new(TriggerEvent::ResourceChanged)
            .with_resource("a", json!({ "class": "Tenant", "app": {} }));

        assert_eq!(deployer.apply_request(&request).await, (true, ResponseCode::Ok));
        assert_eq!(deployer.active().applied_tenants(), vec!["a".to_string()]);

        assert_eq!(deployer.apply_request(&request).await, (true, ResponseCode::Dummy));
        assert_eq!(poster.post_count(), 1);
        assert_eq!(poster.last_post().unwrap().target_url, "mock://declare");
        assert_eq!(handle.status().attempts, 2);
    }

    #[tokio::test]
    async fn test_empty_tenant_set_matches_seeded_envelope() {
        let poster = Arc::new(MockPoster::new());
        let (mut deployer, _handle) = deployer(DeployerConfig::default(), poster.clone());
        let empty = WorkRequest::new(TriggerEvent::Resync);

        assert!(deployer.active().declaration().tenant_names(true).is_empty());
        assert_eq!(deployer.apply_request(&empty).await, (true, ResponseCode::Dummy));
        assert_eq!(poster.post_count(), 0);

        let request = WorkRequest::new(TriggerEvent::ResourceChanged)
            .with_resource("a", json!({ "class": "Tenant", "x": 1 }));
        assert_eq!(deployer.apply_request(&request).await, (true, ResponseCode::Ok));

        // retracting the last tenant posts its stub, then settles on the envelope
        assert_eq!(deployer.apply_request(&empty).await, (true, ResponseCode::Ok));
        assert!(is_tenant_stub(poster.last_post().unwrap().declaration.tenant("a").unwrap()));
        assert_eq!(deployer.apply_request(&empty).await, (true, ResponseCode::Ok));
        assert_eq!(deployer.apply_request(&empty).await, (true, ResponseCode::Dummy));
    }

    #[tokio::test]
    async fn test_unified_failure_leaves_active_untouched() {
        let poster = Arc::new(MockPoster::new().with_default(ResponseCode::CommonError));
        let (mut deployer, handle) = deployer(DeployerConfig::default(), poster.clone());
        let request = WorkRequest::new(TriggerEvent::ResourceChanged)
            .with_resource("a", json!({ "class": "Tenant", "x": 1 }));

        assert_eq!(
            deployer.apply_request(&request).await,
            (false, ResponseCode::CommonError)
        );
        assert!(deployer.active().applied_tenants().is_empty());
        assert!(handle.is_degraded());
        assert_eq!(handle.status().failed_tenants, vec!["a".to_string()]);

        let response = handle.responses().try_take().unwrap();
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_filtered_posts_only_valid_changed_tenants() {
        let poster = Arc::new(MockPoster::new());
        let (mut deployer, _handle) = deployer(filtered(), poster.clone());

        let request = configmap(&["a", "b"], true).with_configmap(
            ConfigMapSource::new("ns", "other").with_tenant("c", json!({ "class": "Tenant" })),
        );
        assert_eq!(deployer.apply_request(&request).await, (true, ResponseCode::Ok));
        assert_eq!(poster.post_count(), 2);
        assert!(poster.posts_for("c").is_empty());
        assert_eq!(poster.posts_for("a")[0].target_url, "mock://declare/a");

        // nothing changed
        assert_eq!(deployer.apply_request(&request).await, (true, ResponseCode::Dummy));
        assert_eq!(poster.post_count(), 2);
    }

    #[tokio::test]
    async fn test_filtered_deletes_removed_tenants_first() {
        let poster = Arc::new(MockPoster::new());
        let (mut deployer, _handle) = deployer(filtered(), poster.clone());

        deployer.apply_request(&configmap(&["a", "b"], true)).await;
        deployer.apply_request(&configmap(&["b"], true)).await;

        let deletion = poster.last_post().unwrap();
        assert_eq!(deletion.tenants, vec!["a".to_string()]);
        assert!(is_tenant_stub(deletion.declaration.tenant("a").unwrap()));
        assert_eq!(deployer.active().tenant_map().len(), 1);
    }

    #[tokio::test]
    async fn test_filtered_failure_is_recorded_in_ledger() {
        let poster = Arc::new(MockPoster::new());
        poster.push_tenant_response("a", ResponseCode::ServiceUnavailable);
        poster.push_tenant_response("b", ResponseCode::UnprocessableEntity);
        let (mut deployer, handle) = deployer(filtered(), poster.clone());

        let outcome = deployer.apply_request(&configmap(&["a", "b"], true)).await;
        assert_eq!(outcome, (false, ResponseCode::ServiceUnavailable));
        assert_eq!(deployer.ledger().tenants(), vec!["a".to_string()]);
        assert_eq!(handle.status().failed_tenants, vec!["a".to_string()]);

        assert_eq!(deployer.replay_failures().await, (true, ResponseCode::Ok));
        assert!(deployer.ledger().is_empty());
        assert_eq!(
            deployer.active().applied_tenants(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    fn versioned(tenants: &[(&str, u32)]) -> WorkRequest {
        let source = tenants
            .iter()
            .fold(ConfigMapSource::new("ns", "cm"), |cm, (name, v)| {
                cm.with_tenant(*name, json!({ "class": "Tenant", "v": v }))
            })
            .validated(true);
        WorkRequest::new(TriggerEvent::ConfigMapChanged).with_configmap(source)
    }

    #[tokio::test]
    async fn test_reverted_tenant_is_not_replayed() {
        let poster = Arc::new(MockPoster::new());
        let (mut deployer, _handle) = deployer(filtered(), poster.clone());

        assert_eq!(
            deployer.apply_request(&versioned(&[("x", 1)])).await,
            (true, ResponseCode::Ok)
        );

        poster.push_tenant_response("x", ResponseCode::ServiceUnavailable);
        assert_eq!(
            deployer.apply_request(&versioned(&[("x", 2)])).await,
            (false, ResponseCode::ServiceUnavailable)
        );
        assert_eq!(deployer.ledger().tenants(), vec!["x".to_string()]);

        // back to what the appliance already has
        assert_eq!(
            deployer.apply_request(&versioned(&[("x", 1)])).await,
            (true, ResponseCode::Dummy)
        );
        assert!(deployer.ledger().is_empty());

        poster.push_tenant_response("y", ResponseCode::CommonError);
        assert_eq!(
            deployer.apply_request(&versioned(&[("x", 1), ("y", 1)])).await,
            (false, ResponseCode::CommonError)
        );
        assert_eq!(deployer.ledger().tenants(), vec!["y".to_string()]);

        assert_eq!(deployer.replay_failures().await, (true, ResponseCode::Ok));
        let x_posts = poster.posts_for("x");
        assert_eq!(x_posts.len(), 2);
        assert_eq!(
            poster.last_post().unwrap().tenants,
            vec!["y".to_string()]
        );
        assert_eq!(
            deployer.active().tenant("x"),
            Some(&json!({ "class": "Tenant", "v": 1 }))
        );
    }

    #[tokio::test]
    async fn test_tenant_dropped_from_request_leaves_ledger() {
        let poster = Arc::new(MockPoster::new());
        poster.push_tenant_response("x", ResponseCode::ServiceUnavailable);
        let (mut deployer, _handle) = deployer(filtered(), poster.clone());

        deployer.apply_request(&versioned(&[("x", 1)])).await;
        assert!(deployer.ledger().contains("x"));

        assert_eq!(
            deployer.apply_request(&versioned(&[])).await,
            (true, ResponseCode::Dummy)
        );
        assert!(deployer.ledger().is_empty());
        assert_eq!(poster.posts_for("x").len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_deletion_counts_as_success() {
        let poster = Arc::new(MockPoster::new());
        let (mut deployer, handle) = deployer(filtered(), poster.clone());

        deployer.apply_request(&configmap(&["a"], true)).await;
        poster.push_tenant_response("a", ResponseCode::NotFound);

        let outcome = deployer.apply_request(&configmap(&[], true)).await;
        assert_eq!(outcome, (true, ResponseCode::NotFound));
        assert!(!handle.is_degraded());
        assert!(deployer.active().tenant_map().is_empty());
    }

    #[tokio::test]
    async fn test_clean_and_delete_partition() {
        let poster = Arc::new(MockPoster::new());
        let (deployer, _handle) = deployer(DeployerConfig::default(), poster.clone());

        assert!(deployer.delete_tenant("a").await.accepted);
        let post = poster.last_post().unwrap();
        assert_eq!(post.target_url, "mock://declare/a");
        assert!(is_tenant_stub(post.declaration.tenant("a").unwrap()));

        assert!(deployer.clean_tenant("managed").await.accepted);
        let post = poster.last_post().unwrap();
        assert_eq!(
            post.declaration.tenant("managed").unwrap()["Shared"]["class"],
            "Application"
        );
    }
}
