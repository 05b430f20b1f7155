//! HTTP transport to the rule backend.

use crate::config::ClientConfig;
use crate::endpoints;
use crate::error::{Error, Result};
use crate::transport::{Member, RuleTransport, SaveRequest, SaveResponse, TaskStatus};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use vigil_rule::{Rule, RuleKind};

/// Body of a 202 response.
#[derive(Debug, Deserialize)]
struct AcceptedBody {
    uuid: String,
}

/// reqwest-backed [`RuleTransport`].
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
    organization: String,
    project: String,
}

impl HttpTransport {
    /// Creates a new transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the token, organization or project is empty, or
    /// the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.auth_token.is_empty() {
            return Err(Error::InvalidConfig("auth token is empty".to_string()));
        }
        if config.organization.is_empty() || config.project.is_empty() {
            return Err(Error::InvalidConfig(
                "organization and project are required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token,
            organization: config.organization,
            project: config.project,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends a request and turns non-success statuses into [`Error`]s.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.bearer_auth(&self.auth_token).send().await?;
        let status = response.status();
        debug!("Received response with status: {}", status);

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        if !status.is_success() {
            let body = response.json::<Value>().await.ok();
            warn!("Request failed with status {}", status);
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn json(response: reqwest::Response) -> Result<Value> {
        response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("invalid JSON body: {e}")))
    }
}

impl RuleTransport for HttpTransport {
    async fn save_rule(&self, request: SaveRequest) -> Result<SaveResponse> {
        let builder = match &request.id {
            Some(id) => {
                let path = endpoints::rule(request.kind, &self.organization, &self.project, id);
                info!("Updating {} rule {}", request.kind, id);
                self.http.put(self.url(&path))
            }
            None => {
                let path = endpoints::rules(request.kind, &self.organization, &self.project);
                info!("Creating {} rule '{}'", request.kind, request.payload.name());
                self.http.post(self.url(&path))
            }
        };

        let response = self
            .send(builder.query(&request.query()).json(&request.payload))
            .await?;

        if response.status() == StatusCode::ACCEPTED {
            let accepted: AcceptedBody = serde_json::from_value(Self::json(response).await?)
                .map_err(|e| Error::Parse(format!("202 without task uuid: {e}")))?;
            info!("Save accepted, verification task {}", accepted.uuid);
            return Ok(SaveResponse::Accepted {
                uuid: accepted.uuid,
            });
        }

        let rule = Rule::from_value(request.kind, Self::json(response).await?)?;
        Ok(SaveResponse::Saved(rule))
    }

    async fn fetch_task(&self, kind: RuleKind, uuid: &str) -> Result<TaskStatus> {
        let path = endpoints::rule_task(kind, &self.organization, &self.project, uuid);
        let response = self.send(self.http.get(self.url(&path))).await?;
        TaskStatus::from_value(kind, &Self::json(response).await?)
    }

    async fn delete_rule(&self, kind: RuleKind, id: &str) -> Result<()> {
        let path = endpoints::rule(kind, &self.organization, &self.project, id);
        info!("Deleting {} rule {}", kind, id);
        self.send(self.http.delete(self.url(&path))).await?;
        Ok(())
    }

    async fn list_members(&self) -> Result<Vec<Member>> {
        let path = endpoints::members(&self.organization);
        let response = self.send(self.http.get(self.url(&path))).await?;
        let members: Vec<Member> = serde_json::from_value(Self::json(response).await?)
            .map_err(|e| Error::Parse(format!("invalid member list: {e}")))?;
        debug!("Fetched {} members", members.len());
        Ok(members)
    }
}
