//! Document emission: resource instances → JSON:API bytes.

use serde_json::{json, Map, Value};

use crate::descriptors::FieldDescriptor;
use crate::errors::ClientError;
use crate::registry;
use crate::resource::{Resource, ToOneSlot};
use crate::value_formatters::KeyFormatter;

/// Controls which fields a serialized resource representation carries.
#[derive(Debug, Clone, Copy)]
pub struct SerializationOptions {
    pub include_id: bool,
    pub dirty_fields_only: bool,
    pub include_to_one: bool,
    pub include_to_many: bool,
    pub omit_null_values: bool,
}

impl SerializationOptions {
    /// `POST` of a brand-new resource: no id, full relationship payload.
    pub fn create() -> Self {
        Self { include_id: false, dirty_fields_only: false, include_to_one: true, include_to_many: true, omit_null_values: false }
    }

    /// `PATCH` of an existing resource, honoring dirty-field tracking.
    pub fn update() -> Self {
        Self { include_id: true, dirty_fields_only: true, include_to_one: true, include_to_many: true, omit_null_values: false }
    }
}

impl Default for SerializationOptions {
    fn default() -> Self {
        Self::create()
    }
}

/// Attribute values are stored on [`Resource`] already in wire-ready form
/// (the deserializer's [`crate::value_formatters::ValueFormatterRegistry`]
/// normalizes dates/URLs on the way in), so unlike the deserializer, the
/// serializer needs no value formatter of its own — only the key formatter.
pub struct Serializer {
    key_formatter: std::sync::Arc<dyn KeyFormatter>,
}

impl Serializer {
    pub fn new(key_formatter: std::sync::Arc<dyn KeyFormatter>) -> Self {
        Self { key_formatter }
    }

    /// Emits `{data: <one-or-array>}` for one or several resources.
    pub fn serialize_resources(&self, resources: &[Resource], options: SerializationOptions) -> Result<Vec<u8>, ClientError> {
        let representations: Result<Vec<Value>, ClientError> =
            resources.iter().map(|r| self.serialize_resource(r, options)).collect();
        let data = match representations?.as_slice() {
            [single] if resources.len() == 1 => single.clone(),
            many => Value::Array(many.to_vec()),
        };
        Ok(serde_json::to_vec(&json!({ "data": data }))?)
    }

    fn serialize_resource(&self, resource: &Resource, options: SerializationOptions) -> Result<Value, ClientError> {
        let resource_type = resource.resource_type();
        let descriptors = registry::descriptors_for(&resource_type)?;

        let mut obj = Map::new();
        obj.insert("type".to_string(), Value::String(resource_type.clone()));
        if options.include_id {
            if let Some(id) = resource.id() {
                obj.insert("id".to_string(), Value::String(id));
            }
        }

        let dirty = resource.dirty_fields();
        let mut attributes = Map::new();
        let mut relationships = Map::new();

        for descriptor in &descriptors {
            if descriptor.is_read_only() {
                continue;
            }
            if options.dirty_fields_only && descriptor.is_attribute() && !dirty.contains(descriptor.name()) {
                continue;
            }

            match descriptor {
                FieldDescriptor::PlainAttribute(_)
                | FieldDescriptor::BooleanAttribute(_)
                | FieldDescriptor::DateAttribute(_, _)
                | FieldDescriptor::UrlAttribute(_, _) => {
                    self.serialize_attribute(resource, descriptor, options, &mut attributes);
                }
                FieldDescriptor::ToOneRelationship(_) => {
                    if options.include_to_one {
                        self.serialize_to_one(resource, descriptor, &mut relationships);
                    }
                }
                FieldDescriptor::ToManyRelationship(_) => {
                    if options.include_to_many {
                        self.serialize_to_many(resource, descriptor, &mut relationships);
                    }
                }
            }
        }

        if !attributes.is_empty() {
            obj.insert("attributes".to_string(), Value::Object(attributes));
        }
        if !relationships.is_empty() {
            obj.insert("relationships".to_string(), Value::Object(relationships));
        }

        Ok(Value::Object(obj))
    }

    fn serialize_attribute(
        &self,
        resource: &Resource,
        descriptor: &FieldDescriptor,
        options: SerializationOptions,
        out: &mut Map<String, Value>,
    ) {
        let wire_key = self.key_formatter.format(descriptor.serialized_name());
        let value = resource.attribute(descriptor.name());

        let formatted = match value {
            None => {
                if options.omit_null_values {
                    return;
                }
                Value::Null
            }
            Some(v) => v,
        };
        out.insert(wire_key, formatted);
    }

    fn serialize_to_one(&self, resource: &Resource, descriptor: &FieldDescriptor, out: &mut Map<String, Value>) {
        let wire_key = self.key_formatter.format(descriptor.serialized_name());
        let slot = resource.to_one(descriptor.name());
        let data = match &slot {
            ToOneSlot::Unset => return,
            ToOneSlot::Empty => Value::Null,
            ToOneSlot::Linked(related) => match identifier_value(related) {
                Some(v) => v,
                None => return,
            },
        };
        out.insert(wire_key, json!({ "data": data }));
    }

    fn serialize_to_many(&self, resource: &Resource, descriptor: &FieldDescriptor, out: &mut Map<String, Value>) {
        let wire_key = self.key_formatter.format(descriptor.serialized_name());
        let collection = resource.to_many(descriptor.name());
        let data: Vec<Value> = collection.resources.iter().filter_map(identifier_value).collect();
        out.insert(wire_key, json!({ "data": data }));
    }

    /// Emits the linkage-only body used against `/relationships/<name>`
    /// endpoints. `resources` empty ⇒ `{data: []}`; a single-element slice
    /// still emits an array, since to-one replace bodies are built by the
    /// caller via [`Serializer::serialize_link_data_one`].
    pub fn serialize_link_data_many(&self, resources: &[Resource]) -> Vec<u8> {
        let data: Vec<Value> = resources.iter().filter_map(identifier_value).collect();
        serde_json::to_vec(&json!({ "data": data })).expect("linkage body is always serializable")
    }

    /// `{data: {type,id}}` or `{data: null}` for a to-one relationship write.
    pub fn serialize_link_data_one(&self, resource: Option<&Resource>) -> Vec<u8> {
        let data = resource.and_then(identifier_value).unwrap_or(Value::Null);
        serde_json::to_vec(&json!({ "data": data })).expect("linkage body is always serializable")
    }
}

fn identifier_value(resource: &Resource) -> Option<Value> {
    let id = resource.id()?;
    Some(json!({ "type": resource.resource_type(), "id": id }))
}
