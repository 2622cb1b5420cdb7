//! Options for read operations.

use datakit_core::{Grouping, Paging, Sorting};

/// Scope, paging, sorting and grouping of a read.
///
/// ```
/// use datakit_core::{Paging, Sorting};
/// use datakit_service::QueryOptions;
///
/// let options = QueryOptions::new()
///     .scope("Creator, Tags")
///     .paging(Paging::page(2, 50))
///     .sort(Sorting::desc("CreatedTime"));
/// assert_eq!(options.sortings.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Projection/inclusion specifier passed to the driver as is.
    pub scope: Option<String>,
    pub paging: Option<Paging>,
    pub sortings: Vec<Sorting>,
    pub grouping: Option<Grouping>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn paging(mut self, paging: Paging) -> Self {
        self.paging = Some(paging);
        self
    }

    /// Append a sort key.
    pub fn sort(mut self, sorting: Sorting) -> Self {
        self.sortings.push(sorting);
        self
    }

    pub fn grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = Some(grouping);
        self
    }
}
