//! Resource type registry.
//!
//! Resource type schemas — the ordered list of field descriptors for each
//! registered type string — live in a process-wide registry, immutable
//! after the first operation is issued, via a `OnceLock<RwLock<HashMap<..>>>`.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::descriptors::FieldDescriptor;
use crate::errors::ClientError;

struct Registered {
    fields: Vec<FieldDescriptor>,
}

static REGISTRY: OnceLock<RwLock<HashMap<String, Registered>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<String, Registered>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers a resource type with its ordered field list.
///
/// Because resource instances hold state in an attribute-slot map rather
/// than behind generated per-type Rust structs, there is no separate
/// "constructor" to register: instantiating any registered type is simply
/// allocating an empty, type-tagged [`crate::resource::Resource`].
pub fn register_resource_type(resource_type: impl Into<String>, fields: Vec<FieldDescriptor>) {
    registry().write().unwrap().insert(resource_type.into(), Registered { fields });
}

/// Removes every registration. Exposed for test isolation since the
/// registry is process-wide.
pub fn clear_registry() {
    registry().write().unwrap().clear();
}

pub fn is_registered(resource_type: &str) -> bool {
    registry().read().unwrap().contains_key(resource_type)
}

pub fn descriptors_for(resource_type: &str) -> Result<Vec<FieldDescriptor>, ClientError> {
    registry()
        .read()
        .unwrap()
        .get(resource_type)
        .map(|r| r.fields.clone())
        .ok_or_else(|| ClientError::ResourceTypeUnregistered(resource_type.to_string()))
}

pub fn descriptor_named<'a>(fields: &'a [FieldDescriptor], name: &str) -> Option<&'a FieldDescriptor> {
    fields.iter().find(|d| d.name() == name || d.serialized_name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // The registry is a process-wide global; #[serial] keys a lock shared
    // across the whole test binary so these don't stomp on the registry
    // tests in pool.rs/serializer.rs running concurrently.
    #[test]
    #[serial]
    fn unregistered_type_is_an_error() {
        clear_registry();
        let err = descriptors_for("unknown-type").unwrap_err();
        assert!(matches!(err, ClientError::ResourceTypeUnregistered(t) if t == "unknown-type"));
    }

    #[test]
    #[serial]
    fn registered_type_returns_its_fields() {
        clear_registry();
        register_resource_type("foos", vec![FieldDescriptor::plain("stringAttribute")]);
        let fields = descriptors_for("foos").unwrap();
        assert_eq!(fields.len(), 1);
        assert!(is_registered("foos"));
    }
}
