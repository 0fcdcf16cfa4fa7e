use async_trait::async_trait;

use crate::error::DomainError;
use crate::types::{
    ReadTextFileParams, ReadTextFileResult, RequestPermissionParams, RequestPermissionResult,
    TerminalCreateParams, TerminalCreateResult, TerminalExitStatus, TerminalIdParams,
    TerminalOutputResult, WriteTextFileParams, WriteTextFileResult,
};

/// Backs the `fs/readTextFile` and `fs/writeTextFile` inbound requests.
///
/// Implemented concretely by `acp-providers`; the client only depends on
/// this trait so the two crates don't form a cycle.
#[async_trait]
pub trait FilesystemProvider: Send + Sync {
    async fn read_text_file(
        &self,
        params: ReadTextFileParams,
    ) -> Result<ReadTextFileResult, DomainError>;

    async fn write_text_file(
        &self,
        params: WriteTextFileParams,
    ) -> Result<WriteTextFileResult, DomainError>;
}

/// Backs the `terminal/*` family of inbound requests.
#[async_trait]
pub trait TerminalProvider: Send + Sync {
    async fn create(
        &self,
        params: TerminalCreateParams,
    ) -> Result<TerminalCreateResult, DomainError>;

    async fn output(&self, params: TerminalIdParams) -> Result<TerminalOutputResult, DomainError>;

    async fn wait_for_exit(
        &self,
        params: TerminalIdParams,
    ) -> Result<TerminalExitStatus, DomainError>;

    async fn kill(&self, params: TerminalIdParams) -> Result<(), DomainError>;

    async fn release(&self, params: TerminalIdParams) -> Result<(), DomainError>;
}

/// Backs `session/request_permission`. Implementations surface the prompt
/// to whatever is supervising the session (a UI, a policy engine, a test
/// harness) and resolve once a choice — or cancellation — is made.
///
/// `connection_id` lets an implementation key its one-shot delivery slot
/// per connection, so a second concurrent request on the same connection
/// can replace the first rather than silently queuing behind it.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn request_permission(
        &self,
        connection_id: &str,
        params: RequestPermissionParams,
    ) -> Result<RequestPermissionResult, DomainError>;
}
