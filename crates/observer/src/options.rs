use serde::{Deserialize, Serialize};

use contracts::ObserverError;

/// Options accepted by [`PerformanceObserver::observe`](crate::PerformanceObserver::observe)
///
/// Exactly one of `entry_types` (list form) and `type_` (single form) must be
/// set. Deserializes from `{"entryTypes": [..]}` or `{"type": ".."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObserveOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_types: Option<Vec<String>>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

impl ObserveOptions {
    /// List form
    pub fn entry_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entry_types: Some(types.into_iter().map(Into::into).collect()),
            type_: None,
        }
    }

    /// Single form
    pub fn single(entry_type: impl Into<String>) -> Self {
        Self {
            entry_types: None,
            type_: Some(entry_type.into()),
        }
    }

    /// Requested category names, in request order
    pub(crate) fn requested(self) -> Result<Vec<String>, ObserverError> {
        match (self.entry_types, self.type_) {
            (Some(_), Some(_)) => Err(ObserverError::ConflictingCategorySpec),
            (Some(types), None) => Ok(types),
            (None, Some(single)) => Ok(vec![single]),
            (None, None) => Err(ObserverError::MissingCategorySpec),
        }
    }
}
