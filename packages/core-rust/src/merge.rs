//! Structural overlay of caller variables onto template defaults.
//!
//! [`merge`] never touches the base tree: it deep-copies the base, applies the
//! overlay to the copy, then scans the whole result for leftover
//! [`VarValue::Unset`] placeholders. Overlay scalars always win; only
//! tree-onto-tree is recursive.
//!
//! An `Unset` base leaf accepts a nested tree wholesale, while a populated
//! scalar leaf rejects one. Existing templates rely on that asymmetry.

use crate::variables::{join_path, VarValue, VariableTree};

/// Failure to overlay variables onto a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Overlay supplies a tree where the base holds a populated scalar.
    #[error("variable '{path}' is a tree but the template expects a non-tree value")]
    TreeOverScalar { path: String },
    /// Overlay supplies a non-tree where the base holds a tree.
    #[error("variable '{path}' is not a tree but the template expects a tree")]
    ScalarOverTree { path: String },
    /// A placeholder survived the merge.
    #[error("required variable not supplied: '{path}'")]
    Unresolved { path: String },
}

impl MergeError {
    /// Dotted key path the error refers to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::TreeOverScalar { path } | Self::ScalarOverTree { path } | Self::Unresolved { path } => path,
        }
    }
}

/// Overlays `overlay` onto a copy of `base` and checks the result is send-ready.
///
/// # Errors
///
/// Returns [`MergeError::TreeOverScalar`] / [`MergeError::ScalarOverTree`] on
/// shape mismatch, and [`MergeError::Unresolved`] if any `Unset` leaf remains.
pub fn merge(base: &VariableTree, overlay: &VariableTree) -> Result<VariableTree, MergeError> {
    let mut merged = base.clone();
    overlay_into(&mut merged, overlay, "")?;
    if let Some(path) = merged.first_unset_path() {
        return Err(MergeError::Unresolved { path });
    }
    Ok(merged)
}

fn overlay_into(target: &mut VariableTree, overlay: &VariableTree, prefix: &str) -> Result<(), MergeError> {
    for (key, value) in overlay {
        let Some(existing) = target.get_mut(key) else {
            target.insert(key.clone(), value.clone());
            continue;
        };
        let path = join_path(prefix, key);
        match value {
            VarValue::Map(overlay_tree) => {
                if let VarValue::Map(base_tree) = existing {
                    overlay_into(base_tree, overlay_tree, &path)?;
                } else if existing.is_unset() {
                    *existing = VarValue::Map(overlay_tree.clone());
                } else {
                    return Err(MergeError::TreeOverScalar { path });
                }
            }
            _ if existing.is_tree() => return Err(MergeError::ScalarOverTree { path }),
            _ => *existing = value.clone(),
        }
    }
    Ok(())
}
