//! Request/response access to the remote simulation service.
//!
//! [`RemoteService`] is the seam every other component talks through;
//! [`HttpRemote`] is the production implementation over plain HTTP/JSON.

use std::future::Future;
use std::time::Duration;

use birdwatch_core::{EnvironmentFactors, RunConfig, SavedRun, SnapshotUpdate, TimeStep, Zone};
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::settings::ClientSettings;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("{operation}: transport failure: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    #[error("{operation}: service answered {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("{operation}: unexpected response shape: {message}")]
    Shape {
        operation: &'static str,
        message: String,
    },
}

impl RemoteError {
    pub fn operation(&self) -> &'static str {
        match self {
            RemoteError::Transport { operation, .. }
            | RemoteError::Status { operation, .. }
            | RemoteError::Shape { operation, .. } => operation,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::Transport { .. } => "transport",
            RemoteError::Status { .. } => "status",
            RemoteError::Shape { .. } => "shape",
        }
    }

    fn from_reqwest(operation: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Shape {
                operation,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            RemoteError::Status {
                operation,
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            RemoteError::Transport {
                operation,
                message: err.to_string(),
            }
        }
    }
}

/// Operations the simulation service exposes. Acknowledgement bodies are
/// ignored; any success status counts.
pub trait RemoteService: Send + Sync + 'static {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<SnapshotUpdate, RemoteError>> + Send;

    fn start(&self) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn stop(&self) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn fetch_config(&self) -> impl Future<Output = Result<RunConfig, RemoteError>> + Send;

    fn push_config(
        &self,
        config: RunConfig,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn fetch_time_step(&self) -> impl Future<Output = Result<TimeStep, RemoteError>> + Send;

    fn push_time_step(
        &self,
        step: TimeStep,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn save_run(&self) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn load_run(&self) -> impl Future<Output = Result<SavedRun, RemoteError>> + Send;

    fn fetch_environment(
        &self,
    ) -> impl Future<Output = Result<EnvironmentFactors, RemoteError>> + Send;

    fn push_environment(
        &self,
        factors: EnvironmentFactors,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn fetch_zones(&self) -> impl Future<Output = Result<Vec<Zone>, RemoteError>> + Send;

    fn push_zones(
        &self,
        zones: Vec<Zone>,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn ping(&self) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// [`RemoteService`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RemoteError::from_reqwest("build_client", err))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, RemoteError> {
        Self::new(settings.backend_url.clone(), settings.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T>(&self, operation: &'static str, path: &str) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
    {
        let url = join_url(&self.base_url, path);
        debug!(operation, %url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| RemoteError::from_reqwest(operation, err))?;
        decode_response(operation, response).await
    }

    async fn post_json<B>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<(), RemoteError>
    where
        B: Serialize + ?Sized,
    {
        let url = join_url(&self.base_url, path);
        debug!(operation, %url, "POST");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| RemoteError::from_reqwest(operation, err))?;
        check_status(operation, response).await.map(drop)
    }

    async fn post_empty(&self, operation: &'static str, path: &str) -> Result<(), RemoteError> {
        let url = join_url(&self.base_url, path);
        debug!(operation, %url, "POST");
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|err| RemoteError::from_reqwest(operation, err))?;
        check_status(operation, response).await.map(drop)
    }
}

impl RemoteService for HttpRemote {
    async fn fetch_snapshot(&self) -> Result<SnapshotUpdate, RemoteError> {
        self.get_json("fetch_snapshot", "/simulation").await
    }

    async fn start(&self) -> Result<(), RemoteError> {
        self.post_empty("start", "/simulation/start").await
    }

    async fn stop(&self) -> Result<(), RemoteError> {
        self.post_empty("stop", "/simulation/stop").await
    }

    async fn fetch_config(&self) -> Result<RunConfig, RemoteError> {
        self.get_json("fetch_config", "/simulation/config").await
    }

    async fn push_config(&self, config: RunConfig) -> Result<(), RemoteError> {
        self.post_json("push_config", "/simulation/config", &config)
            .await
    }

    async fn fetch_time_step(&self) -> Result<TimeStep, RemoteError> {
        self.get_json("fetch_time_step", "/simulation/time-step")
            .await
    }

    async fn push_time_step(&self, step: TimeStep) -> Result<(), RemoteError> {
        self.post_json("push_time_step", "/simulation/time-step", &step)
            .await
    }

    async fn save_run(&self) -> Result<(), RemoteError> {
        self.post_empty("save_run", "/simulation/save").await
    }

    async fn load_run(&self) -> Result<SavedRun, RemoteError> {
        self.get_json("load_run", "/simulation/load").await
    }

    async fn fetch_environment(&self) -> Result<EnvironmentFactors, RemoteError> {
        self.get_json("fetch_environment", "/environment").await
    }

    async fn push_environment(&self, factors: EnvironmentFactors) -> Result<(), RemoteError> {
        self.post_json("push_environment", "/environment", &factors)
            .await
    }

    async fn fetch_zones(&self) -> Result<Vec<Zone>, RemoteError> {
        // An empty zone list may arrive as `null`.
        let zones: Option<Vec<Zone>> = self.get_json("fetch_zones", "/zones").await?;
        Ok(zones.unwrap_or_default())
    }

    async fn push_zones(&self, zones: Vec<Zone>) -> Result<(), RemoteError> {
        self.post_json("push_zones", "/zones", &zones).await
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        let url = join_url(&self.base_url, "/ping");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| RemoteError::from_reqwest("ping", err))?;
        check_status("ping", response).await.map(drop)
    }
}

async fn check_status(operation: &'static str, response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unavailable>".to_string());
    Err(RemoteError::Status {
        operation,
        status: status.as_u16(),
        body,
    })
}

async fn decode_response<T>(operation: &'static str, response: Response) -> Result<T, RemoteError>
where
    T: DeserializeOwned,
{
    let response = check_status(operation, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|err| RemoteError::from_reqwest(operation, err))?;
    serde_json::from_slice(&bytes).map_err(|err| RemoteError::Shape {
        operation,
        message: err.to_string(),
    })
}

pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
