use std::error::Error;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SvcError {
    #[error("Service {0:?} is already registered")]
    AlreadyRegistered(String),

    #[error("Service {name:?} failed: {err}")]
    Failed {
        name: String,
        err: Box<dyn Error + Send + Sync>,
    },

    #[error(transparent)]
    Service(Box<dyn Error + Send + Sync>),

    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),
}

impl SvcError {
    pub fn service(err: impl Error + Send + Sync + 'static) -> Self {
        Self::Service(Box::new(err))
    }

    #[must_use]
    pub fn named(self, name: &str) -> Self {
        match self {
            Self::Service(err) => Self::Failed {
                name: name.to_string(),
                err,
            },
            other => other,
        }
    }
}
