//! HTTP client for a running `courier serve`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use courier_core::TaskDetails;

#[derive(Deserialize)]
struct TaskList {
    tasks: Vec<TaskDetails>,
}

pub struct RemoteApi {
    base: String,
    client: reqwest::Client,
}

impl RemoteApi {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn tasks(&self) -> Result<Vec<TaskDetails>> {
        let url = format!("{}/api/tasks", self.base);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Courier is not reachable at {}", self.base))?;
        let list: TaskList = resp.error_for_status()?.json().await?;
        Ok(list.tasks)
    }

    pub async fn task(&self, id: Uuid) -> Result<TaskDetails> {
        let url = format!("{}/api/tasks/{id}", self.base);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Courier is not reachable at {}", self.base))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            bail!("task {id} not found");
        }
        Ok(resp.error_for_status()?.json().await?)
    }

    pub async fn stop(&self, id: Uuid) -> Result<TaskDetails> {
        let url = format!("{}/api/tasks/{id}/stop", self.base);
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .with_context(|| format!("Courier is not reachable at {}", self.base))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            bail!("task {id} not found");
        }
        Ok(resp.error_for_status()?.json().await?)
    }
}
