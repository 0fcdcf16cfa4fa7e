//! Turns an agent's `session/update` stream into session-store mutations
//! and consumer-facing events.

use acp_client::types::StopReason;
use acp_session::{ConsumerEvent, MessageRole, SessionStore, ToolCallRecord};
use acp_wire::{SessionUpdate, SessionUpdateParams, ToolCallStatus};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub(crate) async fn apply(
    sessions: &SessionStore,
    events: &mpsc::UnboundedSender<ConsumerEvent>,
    params: &SessionUpdateParams,
) {
    let session_id = params.session_id.clone();
    match &params.update {
        SessionUpdate::AgentMessageChunk { content } => {
            emit_message(sessions, events, session_id, MessageRole::Agent, content.clone()).await;
        }
        SessionUpdate::UserMessageChunk { content } => {
            emit_message(sessions, events, session_id, MessageRole::User, content.clone()).await;
        }
        SessionUpdate::ToolCall(fields) => {
            let record = ToolCallRecord {
                id: fields.tool_call_id.clone(),
                title: fields.title.clone().unwrap_or_default(),
                kind: fields.kind,
                status: fields.status.unwrap_or(ToolCallStatus::Pending),
                content: fields.content.clone(),
                locations: fields.locations.clone(),
                timestamp: 0,
            };
            if let Err(err) = sessions.add_tool_call(&session_id, record.clone()).await {
                warn!("dropping tool_call for unknown session `{session_id}`: {err}");
                return;
            }
            let _ = events.send(ConsumerEvent::AgentToolCall {
                session_id,
                tool_call: record,
                is_update: false,
            });
        }
        SessionUpdate::ToolCallUpdate(fields) => {
            let result = sessions
                .update_tool_call(
                    &session_id,
                    &fields.tool_call_id,
                    fields.title.clone(),
                    fields.kind,
                    fields.status,
                    fields.content.clone(),
                    fields.locations.clone(),
                )
                .await;
            if let Err(err) = result {
                warn!("dropping tool_call_update `{}`: {err}", fields.tool_call_id);
                return;
            }
            if let Ok(session) = sessions.get(&session_id).await {
                if let Some(tool_call) = session
                    .tool_calls
                    .into_iter()
                    .find(|tc| tc.id == fields.tool_call_id)
                {
                    let _ = events.send(ConsumerEvent::AgentToolCall {
                        session_id,
                        tool_call,
                        is_update: true,
                    });
                }
            }
        }
        SessionUpdate::Plan { entries } => {
            let _ = events.send(ConsumerEvent::AgentPlan {
                session_id,
                entries: entries.clone(),
            });
        }
        SessionUpdate::AvailableCommandsUpdate { available_commands } => {
            let _ = events.send(ConsumerEvent::AgentCommands {
                session_id,
                available_commands: available_commands.clone(),
            });
        }
        SessionUpdate::Unknown { session_update, .. } => {
            debug!(session_update, "ignoring unrecognized session update");
        }
    }
}

async fn emit_message(
    sessions: &SessionStore,
    events: &mpsc::UnboundedSender<ConsumerEvent>,
    session_id: String,
    role: MessageRole,
    content: acp_wire::ContentBlock,
) {
    if let Err(err) = sessions.add_message(&session_id, role, content.clone(), 0).await {
        warn!("dropping message chunk for unknown session `{session_id}`: {err}");
        return;
    }
    let _ = events.send(ConsumerEvent::AgentMessage {
        session_id,
        role,
        content,
    });
}

pub(crate) fn stop_reason_str(reason: StopReason) -> &'static str {
    match reason {
        StopReason::EndTurn => "end_turn",
        StopReason::MaxTokens => "max_tokens",
        StopReason::MaxTurnRequests => "max_turn_requests",
        StopReason::Refusal => "refusal",
        StopReason::Cancelled => "cancelled",
    }
}
