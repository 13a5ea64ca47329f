//! HTTP transport to the appliance's declarative endpoint

use adcsync_deployer::{DeclarationPoster, PosterError};
use adcsync_types::{ApplianceVersion, Declaration, PostOutcome, ResponseCode};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ApplianceConfig;
use crate::error::DaemonResult;

pub const DECLARE_PATH: &str = "/mgmt/shared/appsvcs/declare";
pub const INFO_PATH: &str = "/mgmt/shared/appsvcs/info";

/// Body of the extension info endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    version: String,
    release: String,
    schema_current: String,
}

/// Posts declarations with basic auth
pub struct HttpPoster {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpPoster {
    pub fn new(config: &ApplianceConfig) -> DaemonResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl DeclarationPoster for HttpPoster {
    async fn post(&self, declaration: &Declaration, target_url: &str) -> PostOutcome {
        let response = self
            .client
            .post(target_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(declaration)
            .send()
            .await;

        let code = match response {
            Ok(response) => {
                let status = response.status();
                let code = ResponseCode::from_status(status.as_u16());
                if code != ResponseCode::Ok {
                    let body = response.text().await.unwrap_or_default();
                    warn!(
                        url = %target_url,
                        status = status.as_u16(),
                        code = %code,
                        body = %body,
                        "Appliance rejected declaration"
                    );
                } else {
                    debug!(url = %target_url, status = status.as_u16(), "Declaration accepted");
                }
                code
            }
            Err(e) => {
                warn!(url = %target_url, error = %e, "Failed to reach appliance");
                ResponseCode::CommonError
            }
        };

        PostOutcome::from_code(code)
    }

    fn target_url(&self, tenants: Option<&[String]>) -> String {
        match tenants {
            Some(tenants) if !tenants.is_empty() => {
                format!("{}{}/{}", self.base_url, DECLARE_PATH, tenants.join(","))
            }
            _ => format!("{}{}", self.base_url, DECLARE_PATH),
        }
    }

    async fn query_version(&self) -> Result<ApplianceVersion, PosterError> {
        let url = format!("{}{}", self.base_url, INFO_PATH);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| PosterError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PosterError::InvalidResponse(format!(
                "{} returned {}",
                url, status
            )));
        }

        let info: InfoResponse = response
            .json()
            .await
            .map_err(|e| PosterError::InvalidResponse(e.to_string()))?;

        Ok(ApplianceVersion {
            version: info.version,
            build: info.release,
            schema_version: info.schema_current,
        })
    }
}
