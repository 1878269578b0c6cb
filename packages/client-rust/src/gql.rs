//! Request bodies for the persisted-query endpoint.
//!
//! A single operation is sent as one JSON object; several are sent as a JSON
//! array and answered in the same order.

use dropwire_core::{OperationError, OperationRegistry, SpecializedOperation, VariableTree};

/// Failure to build a request body.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("empty request batch")]
    EmptyBatch,
}

/// One or more specialized operations ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum GqlRequest {
    Single(SpecializedOperation),
    Batch(Vec<SpecializedOperation>),
}

impl GqlRequest {
    /// Looks up and specializes a single operation.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Operation`] for an unknown name or a failed merge.
    pub fn build(registry: &OperationRegistry, name: &str, variables: &VariableTree) -> Result<Self, RequestError> {
        Ok(Self::Single(registry.specialize(name, variables)?))
    }

    /// Groups already specialized operations into one request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::EmptyBatch`] if `operations` is empty.
    pub fn batch(operations: Vec<SpecializedOperation>) -> Result<Self, RequestError> {
        if operations.is_empty() {
            return Err(RequestError::EmptyBatch);
        }
        Ok(Self::Batch(operations))
    }

    /// Operations in send order.
    #[must_use]
    pub fn operations(&self) -> &[SpecializedOperation] {
        match self {
            Self::Single(op) => std::slice::from_ref(op),
            Self::Batch(ops) => ops,
        }
    }

    /// Encoded JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Encode`] if serialization fails.
    pub fn to_body(&self) -> Result<Vec<u8>, RequestError> {
        let body = match self {
            Self::Single(op) => serde_json::to_vec(op)?,
            Self::Batch(ops) => serde_json::to_vec(ops)?,
        };
        tracing::debug!(
            operations = self.operations().len(),
            bytes = body.len(),
            "encoded request body"
        );
        Ok(body)
    }
}
