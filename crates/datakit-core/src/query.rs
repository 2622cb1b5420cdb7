//! Paging, sorting and grouping parameters passed through to the driver.

use serde::{Deserialize, Serialize};

use crate::condition::Criteria;

/// Page window for set queries.
///
/// Pages are numbered from 1. A `size` of 0 disables paging. The driver
/// fills in [`total_count`](Paging::total_count) when it runs the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub index: u64,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

impl Default for Paging {
    fn default() -> Self {
        Self::page(1, Self::DEFAULT_SIZE)
    }
}

impl Paging {
    pub const DEFAULT_SIZE: u64 = 20;

    /// Page `index` (clamped to at least 1) of `size` rows.
    pub const fn page(index: u64, size: u64) -> Self {
        Self {
            index: if index == 0 { 1 } else { index },
            size,
            total_count: None,
        }
    }

    /// No paging.
    pub const fn disabled() -> Self {
        Self::page(1, 0)
    }

    pub const fn is_enabled(&self) -> bool {
        self.size > 0
    }

    /// Number of rows to skip. Saturates at `u64::MAX`, past any real table.
    pub const fn offset(&self) -> u64 {
        self.index.saturating_sub(1).saturating_mul(self.size)
    }

    /// Number of pages, once the driver has reported a total.
    pub fn page_count(&self) -> Option<u64> {
        let total = self.total_count?;
        if self.size == 0 {
            return Some(u64::from(total > 0));
        }
        Some(total.div_ceil(self.size))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortingMode {
    #[default]
    Ascending,
    Descending,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorting {
    pub name: String,
    #[serde(default)]
    pub mode: SortingMode,
}

impl Sorting {
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: SortingMode::Ascending,
        }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: SortingMode::Descending,
        }
    }
}

/// Grouping keys with an optional post-group filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grouping {
    pub keys: Vec<String>,
    pub filter: Option<Criteria>,
}

impl Grouping {
    pub fn by<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            filter: None,
        }
    }

    pub fn having(mut self, filter: impl Into<Criteria>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_offset_and_count() {
        let mut paging = Paging::page(3, 10);
        assert_eq!(paging.offset(), 20);
        assert_eq!(paging.page_count(), None);

        paging.total_count = Some(41);
        assert_eq!(paging.page_count(), Some(5));
    }

    #[test]
    fn test_huge_page_offset_saturates() {
        assert_eq!(Paging::page(u64::MAX, 2).offset(), u64::MAX);
        assert_eq!(Paging::page(2, u64::MAX).offset(), u64::MAX);

        let paging: Paging = serde_json::from_str(r#"{"index":18446744073709551615,"size":50}"#).unwrap();
        assert_eq!(paging.offset(), u64::MAX);
    }

    #[test]
    fn test_page_zero_clamps() {
        assert_eq!(Paging::page(0, 5).index, 1);
        assert!(!Paging::disabled().is_enabled());
    }

    #[test]
    fn test_sorting_deserializes_default_mode() {
        let sorting: Sorting = serde_json::from_str(r#"{"name":"CreatedTime"}"#).unwrap();
        assert_eq!(sorting, Sorting::asc("CreatedTime"));
    }
}
