use crate::naming::NameError;
use crate::writer::WriterState;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LayerError>;

/// Malformed entity input. Fatal for the batch that contains it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("entity {entity}: unsupported reference type {kind} for {key}")]
    UnsupportedReference {
        entity: String,
        key: String,
        kind: &'static str,
    },
    #[error("entity {entity}: unsupported property type {kind} for {key}")]
    UnsupportedProperty {
        entity: String,
        key: String,
        kind: &'static str,
    },
    #[error("entity {entity}: property {key} has an empty local name")]
    EmptyPropertyName { entity: String, key: String },
    #[error(transparent)]
    InvalidName(#[from] NameError),
}

/// Failure while talking to the graph store. Nothing of the transaction
/// survives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("transaction timed out after {0:?}")]
    Timeout(Duration),
    #[error("{statement} failed: {message}")]
    Statement {
        statement: &'static str,
        message: String,
    },
    #[error("commit failed: {0}")]
    Commit(String),
    #[error("invalid statement parameter: {0}")]
    Parameter(String),
}

/// Host-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadParameter,
    Internal,
    NotSupported,
}

#[derive(Debug, Error)]
pub enum LayerError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("dataset {0} not found")]
    UnknownDataset(String),
    #[error("could not plan batch: {0}")]
    Plan(#[from] PlanError),
    #[error("could not write batch: {0}")]
    Store(#[from] StoreError),
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),
    #[error("line {line}: {message}")]
    Decode { line: usize, message: String },
    #[error("dataset {dataset}: cannot {operation} a writer in state {state}")]
    WriterState {
        dataset: String,
        state: WriterState,
        operation: &'static str,
    },
}

impl LayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LayerError::Config(_)
            | LayerError::UnknownDataset(_)
            | LayerError::Plan(_)
            | LayerError::Decode { .. } => ErrorKind::BadParameter,
            LayerError::NotSupported(_) => ErrorKind::NotSupported,
            LayerError::Store(_) | LayerError::WriterState { .. } => ErrorKind::Internal,
        }
    }
}
