//! Scripted provider client and in-memory stores for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use courier_core::{
    ClientError, CredentialStore, LoginOptions, MessageBody, Recipient, Session, SessionClient,
    TaskDetails, TaskId, TaskInput, TaskLimits, ThreadInfo,
};

use crate::delivery::DeliveryPlan;
use crate::handle::TaskHandle;
use crate::task::TaskDeps;

pub type Sent = (MessageBody, Recipient);

/// What a scripted call does.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok,
    Err(ClientError),
    /// Never resolves.
    Hang,
}

type SendFn = dyn Fn(&MessageBody, &Recipient, usize) -> Reply + Send + Sync;

/// Decides the outcome of each `send`, given the body, recipient and call number.
#[derive(Clone)]
pub struct SendRule(Arc<SendFn>);

impl SendRule {
    pub fn new(f: impl Fn(&MessageBody, &Recipient, usize) -> Reply + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn always_ok() -> Self {
        Self::new(|_, _, _| Reply::Ok)
    }

    pub fn always(err: ClientError) -> Self {
        Self::new(move |_, _, _| Reply::Err(err.clone()))
    }

    pub fn hang() -> Self {
        Self::new(|_, _, _| Reply::Hang)
    }

    /// Reject sends matching `pred`, accept everything else.
    pub fn fail_when(
        pred: impl Fn(&MessageBody, &Recipient) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(move |body, recipient, _| {
            if pred(body, recipient) {
                Reply::Err(ClientError::Rejected("scripted rejection".into()))
            } else {
                Reply::Ok
            }
        })
    }
}

pub struct ScriptedSession {
    rule: SendRule,
    sent: Mutex<Vec<Sent>>,
    calls: AtomicUsize,
    thread_name: Option<String>,
}

impl ScriptedSession {
    pub fn new(rule: SendRule) -> Self {
        Self {
            rule,
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            thread_name: Some("Test Thread".into()),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn thread_info(&self, _recipient: &Recipient) -> Result<ThreadInfo, ClientError> {
        Ok(ThreadInfo {
            name: self.thread_name.clone(),
        })
    }

    async fn send(&self, body: &MessageBody, recipient: &Recipient) -> Result<(), ClientError> {
        self.sent
            .lock()
            .unwrap()
            .push((body.clone(), recipient.clone()));
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match (self.rule.0)(body, recipient, call) {
            Reply::Ok => Ok(()),
            Reply::Err(err) => Err(err),
            Reply::Hang => std::future::pending().await,
        }
    }
}

type LoginFn = dyn Fn(u32) -> Reply + Send + Sync;

/// Session client whose logins follow a script; every successful login hands
/// out the same [`ScriptedSession`].
pub struct ScriptedClient {
    login_rule: Box<LoginFn>,
    logins: AtomicU32,
    session: Arc<ScriptedSession>,
}

impl ScriptedClient {
    pub fn new(send: SendRule) -> Arc<Self> {
        Self::with_login(|_| Reply::Ok, send)
    }

    /// `login` receives the 1-based login attempt number.
    pub fn with_login(
        login: impl Fn(u32) -> Reply + Send + Sync + 'static,
        send: SendRule,
    ) -> Arc<Self> {
        Arc::new(Self {
            login_rule: Box::new(login),
            logins: AtomicU32::new(0),
            session: Arc::new(ScriptedSession::new(send)),
        })
    }

    pub fn login_count(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> &ScriptedSession {
        &self.session
    }
}

#[async_trait]
impl SessionClient for ScriptedClient {
    async fn login(
        &self,
        _credential: &str,
        _options: &LoginOptions,
    ) -> Result<Arc<dyn Session>, ClientError> {
        let attempt = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        match (self.login_rule)(attempt) {
            Reply::Ok => Ok(self.session.clone() as Arc<dyn Session>),
            Reply::Err(err) => Err(err),
            Reply::Hang => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    saved: Mutex<HashMap<TaskId, String>>,
    fail_saves: bool,
}

impl MemoryCredentialStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unwritable() -> Arc<Self> {
        Arc::new(Self {
            fail_saves: true,
            ..Self::default()
        })
    }

    pub fn get(&self, task_id: TaskId) -> Option<String> {
        self.saved.lock().unwrap().get(&task_id).cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn save(&self, task_id: TaskId, credential: &str) -> anyhow::Result<()> {
        if self.fail_saves {
            anyhow::bail!("read-only credential store");
        }
        self.saved
            .lock()
            .unwrap()
            .insert(task_id, credential.to_string());
        Ok(())
    }

    async fn remove(&self, task_id: TaskId) -> anyhow::Result<()> {
        self.saved.lock().unwrap().remove(&task_id);
        Ok(())
    }
}

pub fn deps_with(
    client: Arc<dyn SessionClient>,
    credentials: Arc<dyn CredentialStore>,
    limits: TaskLimits,
) -> TaskDeps {
    let (events, _) = broadcast::channel(1024);
    TaskDeps {
        client,
        credentials,
        delivery: Arc::new(DeliveryPlan::from_limits(&limits)),
        limits,
        events,
    }
}

pub fn deps(client: Arc<dyn SessionClient>) -> TaskDeps {
    deps_with(client, MemoryCredentialStore::new(), TaskLimits::default())
}

pub fn input(content: &str, recipient: &str) -> TaskInput {
    TaskInput {
        message_content: content.to_string(),
        prefix_label: "A".into(),
        suffix_label: "B".into(),
        recipient_id: recipient.to_string(),
        delay: Some(5),
        credential: "c_user=100; xs=token".into(),
    }
}

/// Poll the task's status until `pred` holds. Meant for paused-clock tests,
/// where each poll advances virtual time.
pub async fn wait_for(handle: &TaskHandle, pred: impl Fn(&TaskDetails) -> bool) -> TaskDetails {
    for _ in 0..200_000 {
        let details = handle.details().await;
        if pred(&details) {
            return details;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("task {} never reached the expected state", handle.id());
}
