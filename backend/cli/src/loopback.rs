//! Dry-run provider client.
//!
//! Accepts any non-empty credential and "delivers" every message by writing
//! it to the log. Lets the whole task pipeline run locally without a real
//! messaging account.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use courier_core::{
    ClientError, LoginOptions, MessageBody, Recipient, Session, SessionClient, ThreadInfo,
};

#[derive(Debug, Default)]
pub struct LoopbackClient;

impl LoopbackClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionClient for LoopbackClient {
    async fn login(
        &self,
        credential: &str,
        options: &LoginOptions,
    ) -> Result<Arc<dyn Session>, ClientError> {
        if credential.trim().is_empty() {
            return Err(ClientError::Auth("empty credential".into()));
        }
        info!(
            target: "loopback",
            force_login = options.force_login,
            listen_own_messages = options.listen_own_messages,
            "Dry-run login"
        );
        Ok(Arc::new(LoopbackSession))
    }
}

struct LoopbackSession;

#[async_trait]
impl Session for LoopbackSession {
    async fn thread_info(&self, recipient: &Recipient) -> Result<ThreadInfo, ClientError> {
        Ok(ThreadInfo {
            name: Some(format!("loopback:{recipient}")),
        })
    }

    async fn send(&self, body: &MessageBody, recipient: &Recipient) -> Result<(), ClientError> {
        info!(target: "loopback", recipient = %recipient, body = %body.text(), "Dry-run delivery");
        Ok(())
    }
}
