use thiserror::Error;

#[derive(Error, Debug)]
pub enum HdgError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeYaml(#[from] serde_yml::Error),

    #[error("Node {0:?} is assigned to unknown polling group {1:?}")]
    UnknownPollingGroup(String, String),

    #[error("Node {node:?} is listed in both polling group {first:?} and {second:?}")]
    NodeInMultipleGroups {
        node: String,
        first: String,
        second: String,
    },

    #[error("Duplicate polling group key {0:?}")]
    DuplicateGroup(String),

    #[error("Unknown node {0:?}")]
    UnknownNode(String),

    #[error("Node {0:?} is not writable")]
    NotWritable(String),

    #[error("Value {0:?} is not a number")]
    NotNumeric(String),

    #[error("Value {value} for node {node:?} is outside the range {min}..={max}")]
    OutOfRange {
        node: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Value {value} for node {node:?} is not a multiple of {step} from {min}")]
    InvalidStep {
        node: String,
        value: f64,
        min: f64,
        step: f64,
    },
}

pub type HdgResult<T> = Result<T, HdgError>;
