use fc_core::{FieldError, GraphError, NodeId};
use fc_remote::RemoteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    /// The operation form has field errors; nothing was sent.
    #[error("invalid configuration: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("node '{0}' is not on the canvas")]
    NotFound(NodeId),

    #[error("a source sync is already in progress")]
    SyncBusy,
}

impl EditorError {
    /// Text for an error toast.
    pub fn user_message(&self) -> String {
        match self {
            EditorError::Remote(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            EditorError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
