use std::sync::Arc;

use acp_wire::methods;
use serde_json::Value;

use crate::error::DomainError;
use crate::providers::{FilesystemProvider, PermissionProvider, TerminalProvider};
use crate::types::{
    ReadTextFileParams, RequestPermissionParams, TerminalCreateParams, TerminalIdParams,
    WriteTextFileParams,
};

pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// A method the agent called on us has no handler, bad params, or the
/// provider itself failed. Carries the JSON-RPC code the caller must echo
/// back in the error response.
#[derive(Debug)]
pub struct DispatchError {
    pub code: i32,
    pub message: String,
}

impl DispatchError {
    fn not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("method not found: {method}"),
        }
    }

    fn invalid_params(err: impl std::fmt::Display) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(err: DomainError) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: err.message,
        }
    }
}

/// Capability providers the agent may call back into. Each is optional:
/// a connection opened without a terminal provider, for instance, simply
/// answers `terminal/*` calls with method-not-found.
///
/// Enforcing "at most one pending permission request per connection" is the
/// permission bridge's own job (it owns the one-shot slot keyed by
/// connection id and replaces it, with a logged warning, on a second
/// concurrent request) — this layer just routes the call through.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub fs: Option<Arc<dyn FilesystemProvider>>,
    pub terminal: Option<Arc<dyn TerminalProvider>>,
    pub permission: Option<Arc<dyn PermissionProvider>>,
}

/// Routes one inbound request (agent -> client) to its provider and
/// returns the JSON value to send back as the response result, or a
/// dispatch error to send back as a JSON-RPC error object.
pub async fn dispatch_request(
    connection_id: &str,
    method: &str,
    params: Value,
    caps: &Capabilities,
) -> Result<Value, DispatchError> {
    match method {
        methods::FS_READ_TEXT_FILE => {
            let provider = caps.fs.as_ref().ok_or_else(|| DispatchError::not_found(method))?;
            let params: ReadTextFileParams =
                serde_json::from_value(params).map_err(DispatchError::invalid_params)?;
            let result = provider.read_text_file(params).await?;
            Ok(serde_json::to_value(result).map_err(DispatchError::invalid_params)?)
        }
        methods::FS_WRITE_TEXT_FILE => {
            let provider = caps.fs.as_ref().ok_or_else(|| DispatchError::not_found(method))?;
            let params: WriteTextFileParams =
                serde_json::from_value(params).map_err(DispatchError::invalid_params)?;
            let result = provider.write_text_file(params).await?;
            Ok(serde_json::to_value(result).map_err(DispatchError::invalid_params)?)
        }
        methods::TERMINAL_CREATE => {
            let provider = caps
                .terminal
                .as_ref()
                .ok_or_else(|| DispatchError::not_found(method))?;
            let params: TerminalCreateParams =
                serde_json::from_value(params).map_err(DispatchError::invalid_params)?;
            let result = provider.create(params).await?;
            Ok(serde_json::to_value(result).map_err(DispatchError::invalid_params)?)
        }
        methods::TERMINAL_OUTPUT => {
            let provider = caps
                .terminal
                .as_ref()
                .ok_or_else(|| DispatchError::not_found(method))?;
            let params: TerminalIdParams =
                serde_json::from_value(params).map_err(DispatchError::invalid_params)?;
            let result = provider.output(params).await?;
            Ok(serde_json::to_value(result).map_err(DispatchError::invalid_params)?)
        }
        methods::TERMINAL_WAIT => {
            let provider = caps
                .terminal
                .as_ref()
                .ok_or_else(|| DispatchError::not_found(method))?;
            let params: TerminalIdParams =
                serde_json::from_value(params).map_err(DispatchError::invalid_params)?;
            let result = provider.wait_for_exit(params).await?;
            Ok(serde_json::to_value(result).map_err(DispatchError::invalid_params)?)
        }
        methods::TERMINAL_KILL => {
            let provider = caps
                .terminal
                .as_ref()
                .ok_or_else(|| DispatchError::not_found(method))?;
            let params: TerminalIdParams =
                serde_json::from_value(params).map_err(DispatchError::invalid_params)?;
            provider.kill(params).await?;
            Ok(Value::Object(Default::default()))
        }
        methods::TERMINAL_RELEASE => {
            let provider = caps
                .terminal
                .as_ref()
                .ok_or_else(|| DispatchError::not_found(method))?;
            let params: TerminalIdParams =
                serde_json::from_value(params).map_err(DispatchError::invalid_params)?;
            provider.release(params).await?;
            Ok(Value::Object(Default::default()))
        }
        methods::REQUEST_PERMISSION => {
            let provider = caps
                .permission
                .as_ref()
                .ok_or_else(|| DispatchError::not_found(method))?;
            let params: RequestPermissionParams =
                serde_json::from_value(params).map_err(DispatchError::invalid_params)?;
            let result = provider.request_permission(connection_id, params).await?;
            Ok(serde_json::to_value(result).map_err(DispatchError::invalid_params)?)
        }
        other => Err(DispatchError::not_found(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoPermissionProvider;

    #[async_trait]
    impl PermissionProvider for EchoPermissionProvider {
        async fn request_permission(
            &self,
            _connection_id: &str,
            params: RequestPermissionParams,
        ) -> Result<crate::types::RequestPermissionResult, DomainError> {
            Ok(crate::types::RequestPermissionResult {
                outcome: crate::types::PermissionOutcome::Selected {
                    option_id: params.options.first().map(|o| o.option_id.clone()).unwrap_or_default(),
                },
            })
        }
    }

    #[tokio::test]
    async fn routes_permission_request_to_provider() {
        let caps = Capabilities {
            permission: Some(Arc::new(EchoPermissionProvider)),
            ..Default::default()
        };

        let params = serde_json::to_value(RequestPermissionParams {
            session_id: "s1".into(),
            tool_call_id: "tc1".into(),
            title: "Allow write?".into(),
            options: vec![],
        })
        .unwrap();

        let result = dispatch_request("conn-1", methods::REQUEST_PERMISSION, params, &caps).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn missing_provider_returns_method_not_found() {
        let caps = Capabilities::default();
        let result = dispatch_request("conn-1", methods::FS_READ_TEXT_FILE, Value::Null, &caps).await;
        assert_eq!(result.err().unwrap().code, METHOD_NOT_FOUND);
    }
}
