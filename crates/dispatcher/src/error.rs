use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid server config: {reason}")]
    InvalidConfig { reason: String },

    #[error("dispatcher must be set")]
    MissingDispatcher,

    #[error("reactor error: {source}")]
    Reactor {
        #[from]
        source: micro_http::server::ServerError,
    },
}

impl ServerError {
    pub fn invalid_config<S: ToString>(str: S) -> Self {
        Self::InvalidConfig { reason: str.to_string() }
    }
}
