use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /* device taxonomy */
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Response error: {0}")]
    Response(String),

    #[error("{0}")]
    Generic(String),

    #[error("Request for {0:?} was superseded by a newer request")]
    Preempted(String),

    #[error("Request cancelled, shutting down")]
    Cancelled,

    /* validation */
    #[error(transparent)]
    HdgError(#[from] hdg::error::HdgError),

    /* library errors */
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    SerdeYaml(#[from] serde_yml::Error),

    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    SetLoggerError(#[from] log::SetLoggerError),

    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),

    #[error(transparent)]
    SvcError(#[from] svc::error::SvcError),
}

/// Sort transport failures into the device error taxonomy.
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Connection(err.to_string())
        } else if err.is_status() || err.is_decode() || err.is_body() {
            Self::Response(err.to_string())
        } else {
            Self::Generic(err.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    #[must_use]
    pub fn service_error(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Copy of this error for delivery to an additional waiter.
    ///
    /// Taxonomy variants are reproduced exactly; wrapped library errors are
    /// reduced to their message.
    #[must_use]
    pub fn share(&self) -> Self {
        match self {
            Self::Connection(msg) => Self::Connection(msg.clone()),
            Self::Response(msg) => Self::Response(msg.clone()),
            Self::Generic(msg) => Self::Generic(msg.clone()),
            Self::Preempted(key) => Self::Preempted(key.clone()),
            Self::Cancelled => Self::Cancelled,
            other => Self::Generic(other.to_string()),
        }
    }
}
