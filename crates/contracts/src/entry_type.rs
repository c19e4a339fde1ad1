//! EntryType - the closed set of observable categories

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ObserverError;

/// Observable entry category
///
/// Entries recorded with any other `entry_type` string can still live in a
/// source's buffer, but no observer can subscribe to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// User timing mark
    Mark,
    /// User timing measure
    Measure,
    /// Navigation timing
    Navigation,
    /// Resource timing
    Resource,
}

impl EntryType {
    /// Every observable category, in declaration order
    pub const ALL: [EntryType; 4] = [
        EntryType::Mark,
        EntryType::Measure,
        EntryType::Navigation,
        EntryType::Resource,
    ];

    /// Wire name used in `PerformanceEntry::entry_type`
    pub const fn as_str(self) -> &'static str {
        match self {
            EntryType::Mark => "mark",
            EntryType::Measure => "measure",
            EntryType::Navigation => "navigation",
            EntryType::Resource => "resource",
        }
    }

    /// Look up a category by its wire name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Membership check against the recognized categories
    #[inline]
    pub fn is_valid(name: &str) -> bool {
        Self::parse(name).is_some()
    }
}

impl FromStr for EntryType {
    type Err = ObserverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ObserverError::unknown_entry_type(s))
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<str> for EntryType {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for EntryType {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
