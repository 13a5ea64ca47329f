//! In-memory collaborators for tests and dry runs

use adcsync_types::{ApplianceVersion, Declaration, NetworkingSnapshot, PostOutcome, ResponseCode};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::collaborators::{DeclarationPoster, NetworkingNotifier, PosterError};
use crate::version::{DEFAULT_BUILD, DEFAULT_SCHEMA_VERSION, DEFAULT_VERSION};

/// One post seen by [`MockPoster`]
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub target_url: String,
    /// Tenants named by the posted document, stubs included
    pub tenants: Vec<String>,
    pub declaration: Declaration,
}

/// Scripted poster.
///
/// A post naming a single tenant first consumes that tenant's queued codes,
/// then the shared script, then falls back to the default code.
pub struct MockPoster {
    default_code: ResponseCode,
    script: Mutex<VecDeque<ResponseCode>>,
    tenant_scripts: Mutex<HashMap<String, VecDeque<ResponseCode>>>,
    posts: Mutex<Vec<RecordedPost>>,
    version: Mutex<Result<ApplianceVersion, String>>,
}

impl Default for MockPoster {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPoster {
    /// Poster accepting everything
    pub fn new() -> Self {
        Self {
            default_code: ResponseCode::Ok,
            script: Mutex::new(VecDeque::new()),
            tenant_scripts: Mutex::new(HashMap::new()),
            posts: Mutex::new(Vec::new()),
            version: Mutex::new(Ok(ApplianceVersion {
                version: DEFAULT_VERSION.to_string(),
                build: DEFAULT_BUILD.to_string(),
                schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            })),
        }
    }

    /// Code returned once every script is exhausted
    pub fn with_default(mut self, code: ResponseCode) -> Self {
        self.default_code = code;
        self
    }

    pub fn with_version(self, version: ApplianceVersion) -> Self {
        *self.version.lock() = Ok(version);
        self
    }

    pub fn with_version_error(self, message: impl Into<String>) -> Self {
        *self.version.lock() = Err(message.into());
        self
    }

    /// Queue a code for the next post
    pub fn push_response(&self, code: ResponseCode) {
        self.script.lock().push_back(code);
    }

    /// Queue a code for the next post scoped to `tenant`
    pub fn push_tenant_response(&self, tenant: impl Into<String>, code: ResponseCode) {
        self.tenant_scripts
            .lock()
            .entry(tenant.into())
            .or_default()
            .push_back(code);
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().clone()
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().len()
    }

    /// Posts whose document named `tenant`
    pub fn posts_for(&self, tenant: &str) -> Vec<RecordedPost> {
        self.posts
            .lock()
            .iter()
            .filter(|post| post.tenants.iter().any(|name| name == tenant))
            .cloned()
            .collect()
    }

    pub fn last_post(&self) -> Option<RecordedPost> {
        self.posts.lock().last().cloned()
    }

    fn next_code(&self, tenants: &[String]) -> ResponseCode {
        if let [tenant] = tenants {
            if let Some(code) = self
                .tenant_scripts
                .lock()
                .get_mut(tenant)
                .and_then(|queue| queue.pop_front())
            {
                return code;
            }
        }
        self.script.lock().pop_front().unwrap_or(self.default_code)
    }
}

#[async_trait]
impl DeclarationPoster for MockPoster {
    async fn post(&self, declaration: &Declaration, target_url: &str) -> PostOutcome {
        let tenants = declaration.tenant_names(true);
        let code = self.next_code(&tenants);
        self.posts.lock().push(RecordedPost {
            target_url: target_url.to_string(),
            tenants,
            declaration: declaration.clone(),
        });
        PostOutcome::from_code(code)
    }

    fn target_url(&self, tenants: Option<&[String]>) -> String {
        match tenants {
            Some(tenants) if !tenants.is_empty() => {
                format!("mock://declare/{}", tenants.join(","))
            }
            _ => "mock://declare".to_string(),
        }
    }

    async fn query_version(&self) -> Result<ApplianceVersion, PosterError> {
        self.version.lock().clone().map_err(PosterError::Transport)
    }
}

/// Notifier keeping every published snapshot
#[derive(Default)]
pub struct RecordingNotifier {
    snapshots: Mutex<Vec<NetworkingSnapshot>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<NetworkingSnapshot> {
        self.snapshots.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().len()
    }
}

impl NetworkingNotifier for RecordingNotifier {
    fn publish(&self, snapshot: &NetworkingSnapshot) {
        self.snapshots.lock().push(snapshot.clone());
    }
}
