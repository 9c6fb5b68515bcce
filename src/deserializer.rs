//! Document parsing: JSON:API bytes → pooled resources.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::collections::LinkedResourceCollection;
use crate::descriptors::FieldDescriptor;
use crate::errors::{ClientError, ErrorDomain};
use crate::pool::ResourcePool;
use crate::registry;
use crate::resource::{RelationshipData, RelationshipLinkage, Resource, ToOneSlot};
use crate::value_formatters::{KeyFormatter, ValueFormatterRegistry};

/// A single entry of a top-level `errors` array.
#[derive(Debug, Clone, Default)]
pub struct ApiError {
    pub id: Option<String>,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub title: Option<String>,
    pub detail: Option<String>,
    pub source_pointer: Option<String>,
    pub source_parameter: Option<String>,
    pub meta: Map<String, Value>,
}

impl ApiError {
    /// API errors are, by construction, always server-side.
    pub fn domain(&self) -> ErrorDomain {
        ErrorDomain::Server
    }
}

/// The full result of parsing one JSON:API document.
#[derive(Debug, Clone, Default)]
pub struct JsonApiDocument {
    pub data: Vec<Resource>,
    pub included: Vec<Resource>,
    pub errors: Vec<ApiError>,
    pub meta: Map<String, Value>,
    pub links: HashMap<String, String>,
    pub jsonapi: Option<Value>,
}

impl JsonApiDocument {
    pub fn first_error(&self) -> Option<&ApiError> {
        self.errors.first()
    }
}

/// Parses JSON:API documents, resolving linkage against a fresh
/// [`ResourcePool`] seeded with any caller-supplied mapping targets.
pub struct Deserializer {
    key_formatter: std::sync::Arc<dyn KeyFormatter>,
    value_formatters: ValueFormatterRegistry,
}

impl Deserializer {
    pub fn new(key_formatter: std::sync::Arc<dyn KeyFormatter>) -> Self {
        Self { key_formatter, value_formatters: ValueFormatterRegistry::new() }
    }

    pub fn deserialize(
        &self,
        bytes: &[u8],
        mapping_targets: Vec<Resource>,
    ) -> Result<JsonApiDocument, ClientError> {
        let root: Value = serde_json::from_slice(bytes)?;
        let Value::Object(root) = root else {
            return Err(ClientError::InvalidDocumentStructure);
        };

        let has_data = root.contains_key("data");
        let has_errors = root.contains_key("errors");
        let has_meta = root.contains_key("meta");
        if !has_data && !has_errors && !has_meta {
            return Err(ClientError::TopLevelEntryMissing);
        }
        if has_data && has_errors {
            return Err(ClientError::TopLevelDataAndErrorsCoexist);
        }

        let mut pool = ResourcePool::new();
        pool.seed(mapping_targets);

        let mut data = Vec::new();
        if let Some(data_value) = root.get("data") {
            match data_value {
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        data.push(self.extract_resource(item, &mut pool, Some(index))?);
                    }
                }
                Value::Null => {}
                single => data.push(self.extract_resource(single, &mut pool, Some(0))?),
            }
        }

        let mut included = Vec::new();
        if let Some(Value::Array(items)) = root.get("included") {
            for item in items {
                included.push(self.extract_resource(item, &mut pool, None)?);
            }
        }

        let errors = match root.get("errors") {
            Some(Value::Array(items)) => items.iter().map(Self::extract_error).collect(),
            _ => Vec::new(),
        };

        let meta = match root.get("meta") {
            Some(Value::Object(m)) => m.clone(),
            _ => Map::new(),
        };

        let links = match root.get("links") {
            Some(Value::Object(m)) => Self::extract_links(m),
            _ => HashMap::new(),
        };

        let jsonapi = root.get("jsonapi").cloned();

        self.resolve_to_many_linkage(&pool);

        Ok(JsonApiDocument { data, included, errors, meta, links, jsonapi })
    }

    fn extract_links(raw: &Map<String, Value>) -> HashMap<String, String> {
        let mut links = HashMap::new();
        for (key, value) in raw {
            let Some(url) = value.as_str().map(str::to_string).or_else(|| {
                value.as_object().and_then(|o| o.get("href")).and_then(Value::as_str).map(str::to_string)
            }) else {
                continue;
            };
            let key = if key == "prev" { "previous".to_string() } else { key.clone() };
            links.insert(key, url);
        }
        links
    }

    fn extract_error(raw: &Value) -> ApiError {
        let obj = raw.as_object();
        let get_str = |key: &str| obj.and_then(|o| o.get(key)).and_then(Value::as_str).map(str::to_string);
        let source = obj.and_then(|o| o.get("source")).and_then(Value::as_object);
        ApiError {
            id: get_str("id"),
            status: get_str("status").and_then(|s| s.parse().ok()),
            code: get_str("code"),
            title: get_str("title"),
            detail: get_str("detail"),
            source_pointer: source.and_then(|s| s.get("pointer")).and_then(Value::as_str).map(str::to_string),
            source_parameter: source.and_then(|s| s.get("parameter")).and_then(Value::as_str).map(str::to_string),
            meta: obj
                .and_then(|o| o.get("meta"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }

    fn extract_resource(
        &self,
        raw: &Value,
        pool: &mut ResourcePool,
        index: Option<usize>,
    ) -> Result<Resource, ClientError> {
        let Some(obj) = raw.as_object() else {
            return Err(ClientError::InvalidResourceStructure);
        };
        let resource_type = obj.get("type").and_then(Value::as_str).ok_or(ClientError::ResourceTypeMissing)?;
        let id = obj.get("id").and_then(Value::as_str).ok_or(ClientError::ResourceIDMissing)?;

        let resource = pool.dispense(resource_type, id, index)?;

        if let Some(self_url) = obj.get("links").and_then(Value::as_object).and_then(|l| l.get("self")).and_then(Value::as_str) {
            resource.set_url(self_url);
        }
        if let Some(Value::Object(meta)) = obj.get("meta") {
            resource.set_meta(meta.clone());
        }

        let descriptors = registry::descriptors_for(resource_type)?;
        let attributes = obj.get("attributes").and_then(Value::as_object);
        let relationships = obj.get("relationships").and_then(Value::as_object);

        for descriptor in &descriptors {
            if descriptor.is_attribute() {
                self.extract_attribute(&resource, descriptor, attributes)?;
            } else {
                self.extract_relationship(&resource, descriptor, relationships, pool)?;
            }
        }

        resource.set_loaded(true);
        Ok(resource)
    }

    fn extract_attribute(
        &self,
        resource: &Resource,
        descriptor: &FieldDescriptor,
        attributes: Option<&Map<String, Value>>,
    ) -> Result<(), ClientError> {
        let wire_key = self.key_formatter.format(descriptor.serialized_name());
        let Some(value) = attributes.and_then(|a| a.get(&wire_key)) else {
            return Ok(());
        };
        if value.is_null() {
            // A wire null leaves the slot untouched.
            return Ok(());
        }

        let formatted = match descriptor {
            FieldDescriptor::PlainAttribute(_) => value.clone(),
            FieldDescriptor::BooleanAttribute(_) => {
                Value::Bool(self.value_formatters.format_boolean_in(value).map_err(|_| ClientError::InvalidResourceStructure)?)
            }
            FieldDescriptor::DateAttribute(_, options) => {
                let parsed = self
                    .value_formatters
                    .format_date_in(value, options)
                    .map_err(|_| ClientError::InvalidResourceStructure)?;
                self.value_formatters.format_date_out(&parsed, options)
            }
            FieldDescriptor::UrlAttribute(_, options) => {
                let parsed = self
                    .value_formatters
                    .format_url_in(value, options)
                    .map_err(|_| ClientError::InvalidResourceStructure)?;
                self.value_formatters.format_url_out(&parsed)
            }
            FieldDescriptor::ToOneRelationship(_) | FieldDescriptor::ToManyRelationship(_) => unreachable!(),
        };
        resource.set_attribute_clean(descriptor.name(), formatted);
        Ok(())
    }

    fn extract_relationship(
        &self,
        resource: &Resource,
        descriptor: &FieldDescriptor,
        relationships: Option<&Map<String, Value>>,
        pool: &mut ResourcePool,
    ) -> Result<(), ClientError> {
        let wire_key = self.key_formatter.format(descriptor.serialized_name());
        let Some(rel_obj) = relationships.and_then(|r| r.get(&wire_key)).and_then(Value::as_object) else {
            return Ok(());
        };

        let links = rel_obj.get("links").and_then(Value::as_object);
        let self_url = links.and_then(|l| l.get("self")).and_then(Value::as_str).map(str::to_string);
        let related_url = links.and_then(|l| l.get("related")).and_then(Value::as_str).map(str::to_string);
        let has_data = rel_obj.contains_key("data");

        match descriptor {
            FieldDescriptor::ToOneRelationship(meta) => {
                let linkage = match rel_obj.get("data") {
                    None => RelationshipLinkage::Undisclosed,
                    Some(Value::Null) => RelationshipLinkage::Empty,
                    Some(Value::Object(o)) => {
                        let id = o.get("id").and_then(Value::as_str).unwrap_or_default();
                        RelationshipLinkage::List(vec![crate::collections::ResourceIdentifier::new(
                            meta.related_type.clone(),
                            id,
                        )])
                    }
                    _ => RelationshipLinkage::Undisclosed,
                };
                resource.set_relationship_data(
                    descriptor.name(),
                    RelationshipData { self_url, related_url: related_url.clone(), linkage: linkage.clone() },
                );

                if has_data {
                    match rel_obj.get("data") {
                        Some(Value::Null) => resource.extract_to_one(descriptor.name(), ToOneSlot::Empty),
                        Some(Value::Object(o)) => {
                            let rtype = o.get("type").and_then(Value::as_str).unwrap_or(&meta.related_type);
                            let rid = o.get("id").and_then(Value::as_str).ok_or(ClientError::ResourceIDMissing)?;
                            let stub = pool.dispense(rtype, rid, None)?;
                            if stub.url().is_none() {
                                if let Some(related) = &related_url {
                                    stub.set_url(related);
                                }
                            }
                            resource.extract_to_one(descriptor.name(), ToOneSlot::Linked(stub));
                        }
                        _ => {}
                    }
                }
            }
            FieldDescriptor::ToManyRelationship(_) => {
                let linkage = match rel_obj.get("data") {
                    None => RelationshipLinkage::Undisclosed,
                    Some(Value::Array(items)) if items.is_empty() => RelationshipLinkage::Empty,
                    Some(Value::Array(items)) => RelationshipLinkage::List(
                        items
                            .iter()
                            .filter_map(Value::as_object)
                            .map(|o| {
                                crate::collections::ResourceIdentifier::new(
                                    o.get("type").and_then(Value::as_str).unwrap_or_default(),
                                    o.get("id").and_then(Value::as_str).unwrap_or_default(),
                                )
                            })
                            .collect(),
                    ),
                    _ => RelationshipLinkage::Undisclosed,
                };
                resource.set_relationship_data(
                    descriptor.name(),
                    RelationshipData { self_url: self_url.clone(), related_url: related_url.clone(), linkage: linkage.clone() },
                );

                let collection = LinkedResourceCollection {
                    resources: Vec::new(),
                    resources_url: related_url,
                    link_url: self_url,
                    linkage,
                    is_loaded: false,
                    ..Default::default()
                };
                resource.extract_to_many(descriptor.name(), collection);
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Step 9: intersect every to-many linkage against the pool; if every
    /// linked `(type,id)` is present, resolve the collection in place.
    fn resolve_to_many_linkage(&self, pool: &ResourcePool) {
        for resource in pool.all() {
            for name in resource.relationship_names() {
                let mut collection = resource.to_many(&name);
                if collection.is_loaded {
                    continue;
                }
                let RelationshipLinkage::List(ids) = &collection.linkage else { continue };
                let resolved: Option<Vec<Resource>> =
                    ids.iter().map(|id| pool.find(&id.resource_type, &id.id)).collect();
                if let Some(resources) = resolved {
                    collection.resources = resources;
                    collection.is_loaded = true;
                    resource.set_to_many(name, collection);
                }
            }
        }
    }
}
