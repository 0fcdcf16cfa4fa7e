#![forbid(unsafe_code)]
//! The consumer-facing facade: wires the wire codec, transport, protocol
//! client, capability providers, session store, and on-disk configuration
//! into the single API a surrounding shell drives.

mod app;
mod directory;
mod error;
mod files;
mod session_bridge;
mod settings;

pub use app::Acp;
pub use directory::{DirectoryPicker, NullDirectoryPicker};
pub use error::AcpError;
pub use files::list_files;
pub use settings::{JsonSettingsStore, Settings, SettingsStore};

pub use acp_client::types::StopReason;
pub use acp_client::{ClientError, ConnectionEvent};
pub use acp_config::{AgentConfig, Config as AgentCatalogConfig, DetectedAgent};
pub use acp_session::{ConsumerEvent, MessageRole, SessionRecord, ToolCallRecord};
pub use acp_wire::ContentBlock;
