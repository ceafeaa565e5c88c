use thiserror::Error;

use crate::proto::{ErrorCode, RpcError};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unsupported protocol version: client={client} daemon={daemon}")]
    UnsupportedProtocol { client: u32, daemon: u32 },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Map internal errors -> stable wire errors.
/// Keep this mapping conservative and stable.
impl From<CoreError> for RpcError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnsupportedProtocol { client, daemon } => RpcError {
                code: ErrorCode::UnsupportedProtocol,
                message: e.to_string(),
                details: [
                    ("client_protocol".into(), client.to_string()),
                    ("daemon_protocol".into(), daemon.to_string()),
                ]
                .into_iter()
                .collect(),
            },
            CoreError::Io { context, .. } => RpcError {
                code: ErrorCode::IoError,
                message: e.to_string(),
                details: [("context".into(), context.into())].into_iter().collect(),
            },
            CoreError::Internal(_) => RpcError::new(ErrorCode::Internal, e.to_string()),
        }
    }
}
