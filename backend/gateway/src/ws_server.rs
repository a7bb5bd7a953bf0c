//! WebSocket entrypoint and connection handler.
//!
//! Each connection holds its own subscription to the task log feed and
//! forwards only the events of tasks it started or subscribed to.

use std::collections::HashSet;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use courier_core::TaskId;
use courier_supervisor::Supervisor;

use crate::server::GatewayState;
use crate::ws_protocol::{ClientMessage, ServerMessage};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: GatewayState) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before reading anything so a task's first log lines are
    // queued here even while its submission is still being answered.
    let mut events = BroadcastStream::new(state.supervisor.subscribe());
    let mut watching = HashSet::new();

    loop {
        let outgoing = tokio::select! {
            incoming = receiver.next() => {
                let Some(Ok(msg)) = incoming else { break };
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(msg) => dispatch(msg, &state.supervisor, &mut watching).await,
                        Err(e) => {
                            warn!(error = %e, "Received invalid WebSocket message");
                            vec![ServerMessage::Error {
                                message: format!("invalid message: {e}"),
                            }]
                        }
                    },
                    Message::Close(_) => break,
                    _ => Vec::new(),
                }
            }
            event = events.next() => match event {
                Some(Ok(event)) if watching.contains(&event.task_id) => vec![event.into()],
                Some(Ok(_)) => Vec::new(),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(skipped, "WebSocket log feed lagged");
                    Vec::new()
                }
                None => break,
            },
        };

        for msg in outgoing {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to encode WebSocket message");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                debug!("WebSocket peer went away");
                return;
            }
        }
    }

    info!("WebSocket connection closed");
}

/// Handle one client message. `watching` is the set of tasks whose log
/// lines this connection forwards.
pub async fn dispatch(
    msg: ClientMessage,
    supervisor: &Supervisor,
    watching: &mut HashSet<TaskId>,
) -> Vec<ServerMessage> {
    match msg {
        ClientMessage::Ping => vec![ServerMessage::Pong],
        ClientMessage::Start(input) => {
            let submission = supervisor.submit(input).await;
            watching.insert(submission.task_id);
            let reply = if submission.started {
                ServerMessage::TaskStarted {
                    task_id: submission.task_id,
                }
            } else {
                ServerMessage::TaskFailed {
                    task_id: submission.task_id,
                    error: submission.error.unwrap_or_default(),
                }
            };
            vec![reply]
        }
        ClientMessage::Subscribe { task_id } => match supervisor.details(task_id).await {
            Ok(details) => {
                watching.insert(task_id);
                vec![ServerMessage::Status {
                    tasks: vec![details],
                }]
            }
            Err(e) => vec![ServerMessage::Error {
                message: e.to_string(),
            }],
        },
        ClientMessage::Stop { task_id } => match supervisor.stop(task_id).await {
            Ok(_) => vec![ServerMessage::Stopped { task_id }],
            Err(e) => vec![ServerMessage::Error {
                message: e.to_string(),
            }],
        },
        ClientMessage::Status { task_id: None } => vec![ServerMessage::Status {
            tasks: supervisor.list().await,
        }],
        ClientMessage::Status {
            task_id: Some(task_id),
        } => match supervisor.details(task_id).await {
            Ok(details) => vec![ServerMessage::Status {
                tasks: vec![details],
            }],
            Err(e) => vec![ServerMessage::Error {
                message: e.to_string(),
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;
    use uuid::Uuid;

    use courier_core::TaskLimits;
    use courier_scheduler::testing::{input, MemoryCredentialStore, ScriptedClient, SendRule};
    use courier_supervisor::FileTaskStore;

    use super::*;

    fn supervisor(dir: &TempDir) -> Supervisor {
        Supervisor::new(
            ScriptedClient::new(SendRule::always_ok()),
            MemoryCredentialStore::new(),
            Arc::new(FileTaskStore::new(dir.path().join("tasks.json"))),
            TaskLimits::default(),
        )
    }

    #[tokio::test]
    async fn start_watches_new_task() {
        let dir = TempDir::new().unwrap();
        let supervisor = supervisor(&dir);
        let mut watching = HashSet::new();

        let replies = dispatch(
            ClientMessage::Start(input("hello", "t_1")),
            &supervisor,
            &mut watching,
        )
        .await;

        let [ServerMessage::TaskStarted { task_id }] = replies.as_slice() else {
            panic!("unexpected replies: {replies:?}");
        };
        assert!(watching.contains(task_id));
    }

    #[tokio::test]
    async fn failed_start_reports_reason() {
        let dir = TempDir::new().unwrap();
        let supervisor = supervisor(&dir);
        let mut watching = HashSet::new();

        let replies = dispatch(ClientMessage::Start(input("", "t_1")), &supervisor, &mut watching).await;
        assert!(matches!(
            replies.as_slice(),
            [ServerMessage::TaskFailed { error, .. }] if error == "message set is empty"
        ));
    }

    #[tokio::test]
    async fn subscribe_stop_and_status() {
        let dir = TempDir::new().unwrap();
        let supervisor = supervisor(&dir);
        let task_id = supervisor.submit(input("hello", "t_1")).await.task_id;
        let mut watching = HashSet::new();

        let replies = dispatch(ClientMessage::Subscribe { task_id }, &supervisor, &mut watching).await;
        assert!(matches!(replies.as_slice(), [ServerMessage::Status { tasks }] if tasks.len() == 1));
        assert!(watching.contains(&task_id));

        let replies = dispatch(ClientMessage::Status { task_id: None }, &supervisor, &mut watching).await;
        assert!(matches!(replies.as_slice(), [ServerMessage::Status { tasks }] if tasks[0].task_id == task_id));

        let replies = dispatch(ClientMessage::Stop { task_id }, &supervisor, &mut watching).await;
        assert_eq!(replies, vec![ServerMessage::Stopped { task_id }]);

        let replies = dispatch(
            ClientMessage::Status {
                task_id: Some(task_id),
            },
            &supervisor,
            &mut watching,
        )
        .await;
        assert!(matches!(replies.as_slice(), [ServerMessage::Error { .. }]));
    }

    #[tokio::test]
    async fn unknown_subscription_is_an_error() {
        let dir = TempDir::new().unwrap();
        let supervisor = supervisor(&dir);
        let mut watching = HashSet::new();
        let replies = dispatch(
            ClientMessage::Subscribe {
                task_id: Uuid::new_v4(),
            },
            &supervisor,
            &mut watching,
        )
        .await;
        assert!(matches!(replies.as_slice(), [ServerMessage::Error { .. }]));
        assert!(watching.is_empty());
        assert_eq!(
            dispatch(ClientMessage::Ping, &supervisor, &mut watching).await,
            vec![ServerMessage::Pong]
        );
    }
}
