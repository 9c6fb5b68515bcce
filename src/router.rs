//! Query-to-URL compiler.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::descriptors::FieldDescriptor;
use crate::query::{Pagination, Query};
use crate::resource::Resource;
use crate::value_formatters::KeyFormatter;

/// Percent-encodes everything outside the RFC 3986 unreserved set. Applied
/// to resource ids and filter values, which come from server data or caller
/// input rather than this crate's own (already wire-safe) key formatting,
/// so a stray `&`, `#`, or space can't be misread as query-string structure.
const VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, VALUE_ENCODE_SET).to_string()
}

/// Compiles [`Query`] values into URLs against a fixed base, with a
/// deterministic ordering of query-string parameters. Holds no state beyond
/// the base URL and the key formatter, so it is cheap to share behind an
/// `Arc` from the client facade.
pub struct Router {
    base_url: String,
    key_formatter: std::sync::Arc<dyn KeyFormatter>,
}

impl Router {
    pub fn new(base_url: impl Into<String>, key_formatter: std::sync::Arc<dyn KeyFormatter>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, key_formatter }
    }

    pub fn url_for_resource_type(&self, resource_type: &str) -> String {
        format!("{}/{}", self.base_url, resource_type)
    }

    /// `urlForQuery`: base path selection, then fixed-order query string.
    pub fn url_for_query(&self, query: &Query) -> String {
        if let Some(url) = &query.url {
            return url.clone();
        }

        let resource_type = query.resource_type.as_deref().unwrap_or_default();
        let mut url = match query.resource_ids.as_slice() {
            [single] if query.filters.is_empty() && query.fields.is_empty() => {
                format!("{}/{}", self.url_for_resource_type(resource_type), encode_value(single))
            }
            [] => self.url_for_resource_type(resource_type),
            ids => {
                let joined = ids.iter().map(|id| encode_value(id)).collect::<Vec<_>>().join(",");
                format!("{}?filter[id]={}", self.url_for_resource_type(resource_type), joined)
            }
        };

        let mut params: Vec<String> = Vec::new();

        if !query.includes.is_empty() {
            let joined = query.includes.iter().map(|n| self.key_formatter.format(n)).collect::<Vec<_>>().join(",");
            params.push(format!("include={joined}"));
        }

        for predicate in &query.filters {
            if predicate.operator == crate::query::ComparisonOperator::Equal {
                let field = self.key_formatter.format(&predicate.field);
                params.push(format!("filter[{}]={}", field, encode_value(&predicate.value)));
            }
        }

        for (resource_type, names) in sorted_fields(&query.fields) {
            let joined = names.iter().map(|n| self.key_formatter.format(n)).collect::<Vec<_>>().join(",");
            params.push(format!("fields[{resource_type}]={joined}"));
        }

        if !query.sort_descriptors.is_empty() {
            let joined = query
                .sort_descriptors
                .iter()
                .map(|d| {
                    let sign = if d.ascending { '+' } else { '-' };
                    format!("{sign}{}", self.key_formatter.format(&d.field))
                })
                .collect::<Vec<_>>()
                .join(",");
            params.push(format!("sort={joined}"));
        }

        if let Some(pagination) = &query.pagination {
            match pagination {
                Pagination::PageBased { page_number, page_size } => {
                    params.push(format!("page[number]={page_number}"));
                    params.push(format!("page[size]={page_size}"));
                }
                Pagination::OffsetBased { offset, limit } => {
                    params.push(format!("page[offset]={offset}"));
                    params.push(format!("page[limit]={limit}"));
                }
            }
        }

        if !params.is_empty() {
            let separator = if url.contains('?') { "&" } else { "?" };
            url.push_str(separator);
            url.push_str(&params.join("&"));
        }

        url
    }

    /// `<base>/<type>/<id>/relationships/<serializedName>`.
    pub fn url_for_relationship(&self, resource: &Resource, descriptor: &FieldDescriptor) -> Option<String> {
        let id = resource.id()?;
        Some(format!(
            "{}/{}/relationships/{}",
            self.url_for_resource_type(&resource.resource_type()),
            encode_value(&id),
            self.key_formatter.format(descriptor.serialized_name()),
        ))
    }
}

/// Deterministic ordering over a query's `fields` map so `urlForQuery` stays
/// idempotent regardless of the caller's `HashMap` iteration order.
fn sorted_fields(fields: &std::collections::HashMap<String, Vec<String>>) -> Vec<(&String, &Vec<String>)> {
    let mut entries: Vec<_> = fields.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ComparisonPredicate, SortDescriptor};
    use crate::value_formatters::DasherizingKeyFormatter;

    fn router() -> Router {
        Router::new("http://example.com", std::sync::Arc::new(DasherizingKeyFormatter))
    }

    #[test]
    fn single_id_query_uses_canonical_singular_form() {
        let q = Query::for_ids("foos", ["1"]);
        assert_eq!(router().url_for_query(&q), "http://example.com/foos/1");
    }

    #[test]
    fn full_query_composition_respects_fixed_parameter_order() {
        let q = Query::for_ids("foos", ["1", "2"])
            .include("toOneAttribute")
            .include("toManyAttribute")
            .filter(ComparisonPredicate::eq("stringAttribute", "stringValue"))
            .field("foos", ["stringAttribute", "integerAttribute"])
            .sort(SortDescriptor::ascending("integerAttribute"))
            .sort(SortDescriptor::descending("floatAttribute"));

        let url = router().url_for_query(&q);
        assert_eq!(
            url,
            "http://example.com/foos?filter[id]=1,2&include=to-one-attribute,to-many-attribute&\
filter[string-attribute]=stringValue&fields[foos]=string-attribute,integer-attribute&\
sort=+integer-attribute,-float-attribute"
        );
    }

    #[test]
    fn pagination_variants_emit_correct_params() {
        let page = Query::for_type("foos").paginate(Pagination::PageBased { page_number: 1, page_size: 5 });
        assert_eq!(router().url_for_query(&page), "http://example.com/foos?page[number]=1&page[size]=5");

        let offset = Query::for_type("foos").paginate(Pagination::OffsetBased { offset: 20, limit: 5 });
        assert_eq!(router().url_for_query(&offset), "http://example.com/foos?page[offset]=20&page[limit]=5");
    }

    #[test]
    fn url_override_short_circuits_everything_else() {
        let q = Query::for_url("http://example.com/custom-link");
        assert_eq!(router().url_for_query(&q), "http://example.com/custom-link");
    }

    #[test]
    fn ids_and_filter_values_are_percent_encoded() {
        let q = Query::for_ids("foos", ["a&b"]);
        assert_eq!(router().url_for_query(&q), "http://example.com/foos/a%26b");

        let q = Query::for_ids("foos", ["a&b", "c d"]);
        assert_eq!(router().url_for_query(&q), "http://example.com/foos?filter[id]=a%26b,c%20d");

        let q = Query::for_type("foos").filter(ComparisonPredicate::eq("stringAttribute", "a b&c"));
        assert_eq!(router().url_for_query(&q), "http://example.com/foos?filter[string-attribute]=a%20b%26c");
    }

    #[test]
    fn relationship_url_uses_serialized_name() {
        let resource = Resource::new("foos");
        resource.set_id("1");
        let descriptor = FieldDescriptor::to_one("toOneAttribute", "bars");
        let url = router().url_for_relationship(&resource, &descriptor).unwrap();
        assert_eq!(url, "http://example.com/foos/1/relationships/to-one-attribute");
    }
}
