//! Structured queries: the value the router compiles into a URL.

use std::collections::HashMap;

/// A comparison between a field path and a constant value.
///
/// Only `Equal` is honored by the router today; the remaining operators are
/// carried so embedding applications can build and inspect richer
/// predicates even though this core only emits the filter form for
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonPredicate {
    pub field: String,
    pub operator: ComparisonOperator,
    pub value: String,
}

impl ComparisonPredicate {
    pub fn new(field: impl Into<String>, operator: ComparisonOperator, value: impl Into<String>) -> Self {
        Self { field: field.into(), operator, value: value.into() }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, ComparisonOperator::Equal, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    PageBased { page_number: u64, page_size: u64 },
    OffsetBased { offset: u64, limit: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortDescriptor {
    pub field: String,
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self { field: field.into(), ascending: true }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self { field: field.into(), ascending: false }
    }
}

/// A composable, immutable-by-convention query. Builder methods consume and
/// return `self` so call sites read as a pipeline.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub resource_type: Option<String>,
    pub resource_ids: Vec<String>,
    /// Escape hatch for a server-provided href; takes precedence over every
    /// other field when building a URL.
    pub url: Option<String>,
    pub includes: Vec<String>,
    pub filters: Vec<ComparisonPredicate>,
    pub fields: HashMap<String, Vec<String>>,
    pub sort_descriptors: Vec<SortDescriptor>,
    pub pagination: Option<Pagination>,
}

impl Query {
    pub fn for_type(resource_type: impl Into<String>) -> Self {
        Self { resource_type: Some(resource_type.into()), ..Default::default() }
    }

    pub fn for_ids(resource_type: impl Into<String>, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            resource_ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn for_url(url: impl Into<String>) -> Self {
        Self { url: Some(url.into()), ..Default::default() }
    }

    pub fn include(mut self, name: impl Into<String>) -> Self {
        self.includes.push(name.into());
        self
    }

    pub fn filter(mut self, predicate: ComparisonPredicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn field(mut self, resource_type: impl Into<String>, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields.entry(resource_type.into()).or_default().extend(names.into_iter().map(Into::into));
        self
    }

    pub fn sort(mut self, descriptor: SortDescriptor) -> Self {
        self.sort_descriptors.push(descriptor);
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}
