//! Capabilities the task core consumes from the outside world.
//!
//! The messaging provider and credential storage are black boxes; the
//! scheduler only ever talks to them through these traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::types::TaskId;

/// Options passed to [`SessionClient::login`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOptions {
    /// Replace any existing session bound to the credential.
    pub force_login: bool,
    /// Receive the session's own outgoing messages as events.
    pub listen_own_messages: bool,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            force_login: true,
            listen_own_messages: false,
        }
    }
}

/// Body handed to [`Session::send`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Plain(String),
    Composite { body: String },
}

impl MessageBody {
    pub fn text(&self) -> &str {
        match self {
            MessageBody::Plain(body) | MessageBody::Composite { body } => body,
        }
    }
}

/// Recipient handed to [`Session::send`]; some providers accept an identifier
/// only in numeric form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    Text(String),
    Numeric(u64),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Text(id) => f.write_str(id),
            Recipient::Numeric(id) => write!(f, "{id}"),
        }
    }
}

/// Metadata about a recipient thread, used only for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub name: Option<String>,
}

/// Logs in to the messaging provider.
#[async_trait]
pub trait SessionClient: Send + Sync + 'static {
    async fn login(
        &self,
        credential: &str,
        options: &LoginOptions,
    ) -> Result<Arc<dyn Session>, ClientError>;
}

/// An authenticated provider session.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    async fn thread_info(&self, recipient: &Recipient) -> Result<ThreadInfo, ClientError>;

    async fn send(&self, body: &MessageBody, recipient: &Recipient) -> Result<(), ClientError>;
}

/// Scoped per-task storage for the raw credential blob.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    async fn save(&self, task_id: TaskId, credential: &str) -> anyhow::Result<()>;

    async fn remove(&self, task_id: TaskId) -> anyhow::Result<()>;
}
