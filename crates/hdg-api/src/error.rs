use thiserror::Error;

#[derive(Error, Debug)]
pub enum HdgApiError {
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },
}

pub type HdgApiResult<T> = Result<T, HdgApiError>;
