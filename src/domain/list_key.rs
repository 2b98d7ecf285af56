use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Prefix that distinguishes user-curated list identifiers from chart names.
const USER_LIST_PREFIX: &str = "ls";

/// Identifier of a remote list: either one of the fixed charts or a
/// user-curated list selected by its `ls…` identifier.
///
/// Keys are validated at construction; an unrecognized pattern never
/// reaches the upstream adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListKey {
    Chart(ChartKind),
    User(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    /// The "most popular movies" chart.
    Popular,
    /// The top-rated movies chart.
    Top,
}

#[derive(Debug, Clone, Error)]
#[error("unrecognized list key `{value}`")]
pub struct ListKeyError {
    pub value: String,
}

impl FromStr for ListKey {
    type Err = ListKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "popular" => Ok(ListKey::Chart(ChartKind::Popular)),
            "top" => Ok(ListKey::Chart(ChartKind::Top)),
            other => match other.strip_prefix(USER_LIST_PREFIX) {
                Some(suffix) if !suffix.is_empty() => Ok(ListKey::User(other.to_string())),
                _ => Err(ListKeyError {
                    value: other.to_string(),
                }),
            },
        }
    }
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKey::Chart(ChartKind::Popular) => f.write_str("popular"),
            ListKey::Chart(ChartKind::Top) => f.write_str("top"),
            ListKey::User(id) => f.write_str(id),
        }
    }
}

impl ListKey {
    pub fn is_user_list(&self) -> bool {
        matches!(self, ListKey::User(_))
    }
}
