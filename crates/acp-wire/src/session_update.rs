//! The session-update payload the agent streams to the client mid-prompt.
//!
//! The wire format overloads the `content` key across variants (a single
//! content block for message chunks, an ordered list of tool-call content
//! items for tool calls). We disambiguate by reading the `sessionUpdate`
//! discriminator first and only then interpreting `content`, and we never
//! let an unrecognized variant fail the whole frame — it decodes to
//! [`SessionUpdate::Unknown`] instead.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single piece of renderable content (text, image, audio, or a resource).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
    ResourceLink {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(
            default,
            rename = "mimeType",
            skip_serializing_if = "Option::is_none"
        )]
        mime_type: Option<String>,
    },
}

/// One entry in a tool call's ordered `content` sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolCallContentItem {
    Content {
        content: ContentBlock,
    },
    Diff {
        path: String,
        #[serde(rename = "oldText", default, skip_serializing_if = "Option::is_none")]
        old_text: Option<String>,
        #[serde(rename = "newText")]
        new_text: String,
    },
    Terminal {
        #[serde(rename = "terminalId")]
        terminal_id: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallKind {
    Read,
    Edit,
    Delete,
    Move,
    Search,
    Execute,
    Think,
    Fetch,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallLocation {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Fields shared by `tool_call` (creation) and `tool_call_update` (partial
/// patch) notifications. On an update, every field but `tool_call_id` is
/// optional: only the fields present should be merged into the existing
/// record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallFields {
    pub tool_call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToolCallKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolCallStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ToolCallContentItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<ToolCallLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryPriority {
    High,
    Medium,
    Low,
    Normal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub content: String,
    pub priority: PlanEntryPriority,
    pub status: PlanEntryStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AvailableCommand {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<CommandInput>,
}

/// The discriminated `session/update` payload. See the module docs for why
/// decode is hand-rolled instead of a plain `#[serde(tag = "sessionUpdate")]`
/// derive: an unrecognized discriminator must decode to [`Self::Unknown`]
/// rather than fail the frame.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    AgentMessageChunk { content: ContentBlock },
    UserMessageChunk { content: ContentBlock },
    ToolCall(ToolCallFields),
    ToolCallUpdate(ToolCallFields),
    Plan { entries: Vec<PlanEntry> },
    AvailableCommandsUpdate { available_commands: Vec<AvailableCommand> },
    /// A discriminator this codec doesn't recognize. The caller is expected
    /// to ignore it rather than treat the frame as malformed.
    Unknown { session_update: String, raw: Value },
}

const DISCRIMINANT_KEY: &str = "sessionUpdate";

impl<'de> Deserialize<'de> for SessionUpdate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut value = Value::deserialize(deserializer)?;
        let discriminant = value
            .get(DISCRIMINANT_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| de::Error::missing_field(DISCRIMINANT_KEY))?
            .to_string();

        let parsed = match discriminant.as_str() {
            "agent_message_chunk" => content_block(&value).map(|content| {
                SessionUpdate::AgentMessageChunk { content }
            }),
            "user_message_chunk" => content_block(&value).map(|content| {
                SessionUpdate::UserMessageChunk { content }
            }),
            "tool_call" => serde_json::from_value(value.clone())
                .ok()
                .map(SessionUpdate::ToolCall),
            "tool_call_update" => serde_json::from_value(value.clone())
                .ok()
                .map(SessionUpdate::ToolCallUpdate),
            "plan" => value
                .get("entries")
                .cloned()
                .and_then(|entries| serde_json::from_value(entries).ok())
                .map(|entries| SessionUpdate::Plan { entries }),
            "available_commands_update" => value
                .get("availableCommands")
                .cloned()
                .and_then(|commands| serde_json::from_value(commands).ok())
                .map(|available_commands| SessionUpdate::AvailableCommandsUpdate {
                    available_commands,
                }),
            _ => None,
        };

        Ok(parsed.unwrap_or_else(|| {
            let raw = value.take();
            SessionUpdate::Unknown {
                session_update: discriminant,
                raw,
            }
        }))
    }
}

/// Reads the overloaded `content` field as a single content block, trying
/// a one-element array as a fallback before giving up — mirrors the spec's
/// "try array then single object" decode rule.
fn content_block(value: &Value) -> Option<ContentBlock> {
    let content = value.get("content")?;
    if let Ok(block) = serde_json::from_value::<ContentBlock>(content.clone()) {
        return Some(block);
    }
    if let Value::Array(items) = content {
        if let Some(first) = items.first() {
            return serde_json::from_value(first.clone()).ok();
        }
    }
    None
}

impl Serialize for SessionUpdate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        match self {
            SessionUpdate::AgentMessageChunk { content } => {
                map.serialize_entry(DISCRIMINANT_KEY, "agent_message_chunk")?;
                map.serialize_entry("content", content)?;
            }
            SessionUpdate::UserMessageChunk { content } => {
                map.serialize_entry(DISCRIMINANT_KEY, "user_message_chunk")?;
                map.serialize_entry("content", content)?;
            }
            SessionUpdate::ToolCall(fields) => {
                map.serialize_entry(DISCRIMINANT_KEY, "tool_call")?;
                serialize_tool_call_fields(&mut map, fields)?;
            }
            SessionUpdate::ToolCallUpdate(fields) => {
                map.serialize_entry(DISCRIMINANT_KEY, "tool_call_update")?;
                serialize_tool_call_fields(&mut map, fields)?;
            }
            SessionUpdate::Plan { entries } => {
                map.serialize_entry(DISCRIMINANT_KEY, "plan")?;
                map.serialize_entry("entries", entries)?;
            }
            SessionUpdate::AvailableCommandsUpdate { available_commands } => {
                map.serialize_entry(DISCRIMINANT_KEY, "available_commands_update")?;
                map.serialize_entry("availableCommands", available_commands)?;
            }
            SessionUpdate::Unknown { session_update, raw } => {
                map.serialize_entry(DISCRIMINANT_KEY, session_update)?;
                if let Value::Object(fields) = raw {
                    for (key, value) in fields {
                        if key != DISCRIMINANT_KEY {
                            map.serialize_entry(key, value)?;
                        }
                    }
                }
            }
        }
        map.end()
    }
}

fn serialize_tool_call_fields<M: SerializeMap>(
    map: &mut M,
    fields: &ToolCallFields,
) -> Result<(), M::Error> {
    map.serialize_entry("toolCallId", &fields.tool_call_id)?;
    if let Some(title) = &fields.title {
        map.serialize_entry("title", title)?;
    }
    if let Some(kind) = &fields.kind {
        map.serialize_entry("kind", kind)?;
    }
    if let Some(status) = &fields.status {
        map.serialize_entry("status", status)?;
    }
    if let Some(content) = &fields.content {
        map.serialize_entry("content", content)?;
    }
    if let Some(locations) = &fields.locations {
        map.serialize_entry("locations", locations)?;
    }
    if let Some(raw_input) = &fields.raw_input {
        map.serialize_entry("rawInput", raw_input)?;
    }
    if let Some(raw_output) = &fields.raw_output {
        map.serialize_entry("rawOutput", raw_output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_agent_message_chunk() {
        let value = json!({
            "sessionUpdate": "agent_message_chunk",
            "content": {"type": "text", "text": "hi"}
        });
        let update: SessionUpdate = serde_json::from_value(value).unwrap();
        assert_eq!(
            update,
            SessionUpdate::AgentMessageChunk {
                content: ContentBlock::Text { text: "hi".into() }
            }
        );
    }

    #[test]
    fn decodes_tool_call_with_diff_content() {
        let value = json!({
            "sessionUpdate": "tool_call",
            "toolCallId": "t1",
            "title": "Edit file",
            "kind": "edit",
            "status": "pending",
            "content": [
                {"type": "diff", "path": "a.rs", "oldText": "old", "newText": "new"}
            ]
        });
        let update: SessionUpdate = serde_json::from_value(value).unwrap();
        match update {
            SessionUpdate::ToolCall(fields) => {
                assert_eq!(fields.tool_call_id, "t1");
                assert_eq!(fields.kind, Some(ToolCallKind::Edit));
                assert_eq!(
                    fields.content,
                    Some(vec![ToolCallContentItem::Diff {
                        path: "a.rs".into(),
                        old_text: Some("old".into()),
                        new_text: "new".into(),
                    }])
                );
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn unknown_discriminant_does_not_fail() {
        let value = json!({"sessionUpdate": "some_future_variant", "foo": "bar"});
        let update: SessionUpdate = serde_json::from_value(value).unwrap();
        match update {
            SessionUpdate::Unknown { session_update, .. } => {
                assert_eq!(session_update, "some_future_variant");
            }
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_plan() {
        let update = SessionUpdate::Plan {
            entries: vec![PlanEntry {
                content: "write tests".into(),
                priority: PlanEntryPriority::High,
                status: PlanEntryStatus::Pending,
            }],
        };
        let value = serde_json::to_value(&update).unwrap();
        let decoded: SessionUpdate = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn round_trips_tool_call_update_partial_fields() {
        let update = SessionUpdate::ToolCallUpdate(ToolCallFields {
            tool_call_id: "t9".into(),
            status: Some(ToolCallStatus::Completed),
            ..Default::default()
        });
        let value = serde_json::to_value(&update).unwrap();
        assert!(value.get("title").is_none());
        let decoded: SessionUpdate = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn round_trips_available_commands() {
        let update = SessionUpdate::AvailableCommandsUpdate {
            available_commands: vec![AvailableCommand {
                name: "review".into(),
                description: "Review the diff".into(),
                input: Some(CommandInput {
                    hint: Some("path".into()),
                }),
            }],
        };
        let value = serde_json::to_value(&update).unwrap();
        let decoded: SessionUpdate = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, update);
    }
}
