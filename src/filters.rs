use serde::Serialize;

use crate::validator::{permitted, Validator};

/// Request-scoped pagination and sorting parameters. `safe_list` is the
/// per-resource allow-list of sortable columns; a leading `-` requests
/// descending order.
#[derive(Debug, Clone)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub safe_list: &'static [&'static str],
}

impl Filters {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// Returns the bare column name, but only if the sort value is on the
    /// safe list. Client input never reaches the query builder through any
    /// other path.
    pub fn sort_column(&self) -> Option<&str> {
        self.safe_list
            .iter()
            .find(|safe| **safe == self.sort)
            .map(|safe| safe.trim_start_matches('-'))
    }

    pub fn sort_direction(&self) -> &'static str {
        if self.sort.starts_with('-') {
            "DESC"
        } else {
            "ASC"
        }
    }

    pub fn validate(&self, v: &mut Validator) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= 10_000_000, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(self.page_size <= 100, "page_size", "must be a maximum of 100");
        v.check(
            permitted(&self.sort.as_str(), self.safe_list),
            "sort",
            "invalid sort value",
        );
    }
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// Read-only pagination summary derived from the pre-pagination row count.
/// Serializes to an empty object when there are no matching records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 {
            return Metadata::default();
        }
        Metadata {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}
