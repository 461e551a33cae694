pub mod config;
pub mod endpoint;
pub mod protocol;
pub mod send;
pub mod server;

pub use config::ConfigError;
pub use endpoint::EndpointError;
pub use protocol::ProtocolError;
pub use send::SendError;
pub use server::ServerError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Server(#[from] server::ServerError),

    #[error(transparent)]
    Endpoint(#[from] endpoint::EndpointError),

    #[error(transparent)]
    Protocol(#[from] protocol::ProtocolError),

    #[error(transparent)]
    Send(#[from] send::SendError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
