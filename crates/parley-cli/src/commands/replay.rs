use anyhow::{Context, Result};
use parley_application::{Router, RouterHandle};
use parley_core::conversation::{Conversation, ConversationKey};
use parley_core::gateway::{Gateway, SessionIdentity};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use uuid::Uuid;

use super::config;
use crate::loopback::LoopbackGateway;

pub struct ReplayOptions {
    pub events: PathBuf,
    pub config: Option<PathBuf>,
    pub self_id: Uuid,
    pub self_name: String,
    pub connected: bool,
    pub print_events: bool,
}

/// A UI action in a replay script. Lines carrying a `command` field are
/// commands; every other line is a raw gateway event.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum ScriptCommand {
    Select {
        conversation: ConversationKey,
    },
    MarkRead {
        conversation: ConversationKey,
    },
    Send {
        conversation: ConversationKey,
        text: String,
    },
    StartTyping {
        conversation: ConversationKey,
    },
    StopTyping {
        conversation: ConversationKey,
    },
    OpenDirectMessage {
        agent_id: Uuid,
        #[serde(default)]
        name: Option<String>,
    },
}

impl ScriptCommand {
    /// Returns `Ok(None)` when the line is not a command.
    fn parse(line: &str) -> Result<Option<Self>> {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            return Ok(None);
        };
        if value.get("command").is_none() {
            return Ok(None);
        }
        let command = serde_json::from_value(value).context("Invalid script command")?;
        Ok(Some(command))
    }

    async fn execute(self, handle: &RouterHandle) -> Result<()> {
        // Commands address conversations by key, so earlier events must be applied.
        handle.flush().await;
        match self {
            Self::Select { conversation } => {
                let id = find(handle, &conversation)?;
                handle.select_conversation(id).await;
                tracing::info!("Selected {}", conversation);
            }
            Self::MarkRead { conversation } => {
                let id = find(handle, &conversation)?;
                handle.mark_read(id).await;
            }
            Self::Send { conversation, text } => {
                let id = find(handle, &conversation)?;
                let outcome = handle.send_message(id, text).await;
                match outcome.status_text() {
                    Some(status) => tracing::warn!("Send to {}: {}", conversation, status),
                    None => tracing::info!("Send to {}: {:?}", conversation, outcome),
                }
            }
            Self::StartTyping { conversation } => {
                let id = find(handle, &conversation)?;
                handle.start_typing(id).await;
            }
            Self::StopTyping { conversation } => {
                let id = find(handle, &conversation)?;
                handle.stop_typing(id).await;
            }
            Self::OpenDirectMessage { agent_id, name } => {
                let id = handle
                    .open_direct_message(agent_id, name.as_deref())
                    .await
                    .context("Router stopped")?;
                tracing::info!("Opened direct conversation {} with {}", id, agent_id);
            }
        }
        Ok(())
    }
}

fn find(handle: &RouterHandle, key: &ConversationKey) -> Result<Uuid> {
    handle
        .conversation_by_key(key)
        .map(|conversation| conversation.id)
        .with_context(|| format!("No conversation for {}", key))
}

/// Feeds every line of the script to the router and prints what it built.
///
/// Blank lines and lines starting with `#` are skipped. Lines the router
/// rejects, and commands that cannot run, are counted and reported on
/// stderr; they do not stop the replay.
pub async fn run(options: ReplayOptions) -> Result<()> {
    let (router_config, _) = config::load(options.config.as_deref())?;
    let script = tokio::fs::read_to_string(&options.events)
        .await
        .with_context(|| format!("Failed to read {}", options.events.display()))?;

    let gateway: Arc<dyn Gateway> = Arc::new(LoopbackGateway::new(options.connected));
    let identity = SessionIdentity::new(options.self_id, options.self_name);
    let handle = Router::spawn(identity, router_config, gateway);
    let mut events = handle.subscribe();

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    for (number, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let result = match ScriptCommand::parse(line) {
            Ok(Some(command)) => command.execute(&handle).await,
            Ok(None) => handle.ingest_json(line).map_err(Into::into),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => accepted += 1,
            Err(e) => {
                rejected += 1;
                tracing::warn!("line {}: {:#}", number + 1, e);
            }
        }
    }
    handle.flush().await;

    if options.print_events {
        loop {
            match events.try_recv() {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("{} change event(s) dropped, raise event_channel_capacity", skipped)
                }
                Err(_) => break,
            }
        }
    }

    let snapshot = handle.conversations();
    let conversations: Vec<&Conversation> = snapshot.iter().map(Arc::as_ref).collect();
    println!("{}", serde_json::to_string_pretty(&conversations)?);

    tracing::info!(
        "Replayed {} line(s), rejected {}, {} conversation(s)",
        accepted,
        rejected,
        conversations.len()
    );
    handle.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_events_are_not_commands() {
        let line = r#"{"type":"chat_from_source","message":"hi"}"#;
        assert_eq!(ScriptCommand::parse(line).unwrap(), None);
        assert_eq!(ScriptCommand::parse("not json").unwrap(), None);
    }

    #[test]
    fn test_parse_send_and_select() {
        let group = Uuid::from_u128(0x33);
        let line = format!(
            r#"{{"command":"send","conversation":{{"kind":"group","key":"{}"}},"text":"hello"}}"#,
            group
        );
        assert_eq!(
            ScriptCommand::parse(&line).unwrap(),
            Some(ScriptCommand::Send {
                conversation: ConversationKey::Group(group),
                text: "hello".to_string(),
            })
        );

        let line = r#"{"command":"select","conversation":{"kind":"local"}}"#;
        assert_eq!(
            ScriptCommand::parse(line).unwrap(),
            Some(ScriptCommand::Select {
                conversation: ConversationKey::Local,
            })
        );
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        assert!(ScriptCommand::parse(r#"{"command":"teleport"}"#).is_err());
    }

    #[tokio::test]
    async fn test_send_command_reaches_gateway_state() {
        let gateway: Arc<dyn Gateway> = Arc::new(LoopbackGateway::new(false));
        let handle = Router::spawn(
            SessionIdentity::new(Uuid::new_v4(), "Tester"),
            Default::default(),
            gateway,
        );
        handle
            .ingest_json(r#"{"type":"chat_from_source","source_id":"11111111-1111-1111-1111-111111111111","source_name":"Alice","source":"agent","message":"hi"}"#)
            .unwrap();

        let command = ScriptCommand::Send {
            conversation: ConversationKey::Local,
            text: "hello".to_string(),
        };
        command.execute(&handle).await.unwrap();
        handle.flush().await;

        let local = handle.conversation_by_key(&ConversationKey::Local).unwrap();
        assert_eq!(local.status.as_deref(), Some("Not connected"));

        let missing = ScriptCommand::Select {
            conversation: ConversationKey::Group(Uuid::new_v4()),
        };
        assert!(missing.execute(&handle).await.is_err());
        handle.shutdown().await;
    }
}
