use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcpError {
    #[error(transparent)]
    Client(#[from] acp_client::ClientError),

    #[error(transparent)]
    Session(#[from] acp_session::SessionError),

    #[error(transparent)]
    Config(#[from] acp_config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no capability providers registered for connection `{0}`")]
    UnknownConnection(String),
}
