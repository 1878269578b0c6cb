//! Persisted-query operation templates and their per-call specializations.
//!
//! A template pins the server operation name and the persisted-query hash.
//! Specializing it never alters either; only the `variables` object changes.

use std::sync::Arc;

use serde::ser::Serializer;
use serde::Serialize;

use crate::merge::{merge, MergeError};
use crate::variables::VariableTree;

/// Persisted-query protocol version. Always `1`.
pub const PERSISTED_QUERY_VERSION: u32 = 1;

/// Errors from looking up or specializing an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("unknown operation: {name}")]
    UnknownOperation { name: String },
    #[error("duplicate operation: {name}")]
    DuplicateOperation { name: String },
    #[error(transparent)]
    Merge(#[from] MergeError),
}

// ---------------------------------------------------------------------------
// OperationTemplate
// ---------------------------------------------------------------------------

/// Immutable request shape: server operation name, integrity hash and default variables.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationTemplate {
    operation_name: Arc<str>,
    sha256_hash: Arc<str>,
    default_variables: Option<Arc<VariableTree>>,
}

impl OperationTemplate {
    /// Template whose requests carry no default variables.
    #[must_use]
    pub fn new(operation_name: impl Into<Arc<str>>, sha256_hash: impl Into<Arc<str>>) -> Self {
        Self {
            operation_name: operation_name.into(),
            sha256_hash: sha256_hash.into(),
            default_variables: None,
        }
    }

    /// Sets the default variable tree. May contain `Unset` placeholders.
    #[must_use]
    pub fn with_variables(mut self, variables: VariableTree) -> Self {
        self.default_variables = Some(Arc::new(variables));
        self
    }

    #[must_use]
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    #[must_use]
    pub fn sha256_hash(&self) -> &str {
        &self.sha256_hash
    }

    #[must_use]
    pub fn default_variables(&self) -> Option<&VariableTree> {
        self.default_variables.as_deref()
    }

    /// Produces an independent request payload with `overlay` merged onto the defaults.
    ///
    /// Without defaults and with an empty overlay, the payload has no `variables`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Merge`] on shape mismatch or an unfilled placeholder.
    pub fn specialize(&self, overlay: &VariableTree) -> Result<SpecializedOperation, OperationError> {
        let variables = match self.default_variables.as_deref() {
            Some(defaults) => Some(merge(defaults, overlay)?),
            None if overlay.is_empty() => None,
            None => Some(merge(&VariableTree::new(), overlay)?),
        };
        tracing::trace!(
            operation = %self.operation_name,
            keys = variables.as_ref().map_or(0, VariableTree::len),
            "specialized operation"
        );
        Ok(SpecializedOperation {
            operation_name: Arc::clone(&self.operation_name),
            sha256_hash: Arc::clone(&self.sha256_hash),
            variables,
        })
    }
}

// ---------------------------------------------------------------------------
// SpecializedOperation
// ---------------------------------------------------------------------------

/// A send-ready request owned by a single caller.
///
/// Fields are read-only; the identity can only come from a template.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecializedOperation {
    operation_name: Arc<str>,
    sha256_hash: Arc<str>,
    variables: Option<VariableTree>,
}

impl SpecializedOperation {
    #[must_use]
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    #[must_use]
    pub fn sha256_hash(&self) -> &str {
        &self.sha256_hash
    }

    #[must_use]
    pub fn variables(&self) -> Option<&VariableTree> {
        self.variables.as_ref()
    }

    /// Wire JSON for this request.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures from `serde_json`.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    operation_name: &'a str,
    extensions: WireExtensions<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a VariableTree>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireExtensions<'a> {
    persisted_query: WirePersistedQuery<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePersistedQuery<'a> {
    version: u32,
    sha256_hash: &'a str,
}

impl Serialize for SpecializedOperation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireRequest {
            operation_name: &self.operation_name,
            extensions: WireExtensions {
                persisted_query: WirePersistedQuery {
                    version: PERSISTED_QUERY_VERSION,
                    sha256_hash: &self.sha256_hash,
                },
            },
            variables: self.variables.as_ref(),
        }
        .serialize(serializer)
    }
}
