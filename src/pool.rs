//! Resource factory + identity pool.
//!
//! The pool is an arena-plus-lookup: an ordered `Vec<Resource>` plus a
//! `(type, id) -> index` map, scoped to a single deserialization. It
//! guarantees at most one instance exists per `(resourceType, id)` within
//! that scope, and supports the positional `dispense(.., index)` path used
//! to map server responses onto caller-supplied mapping targets before
//! their ids are known.

use std::collections::HashMap;

use crate::collections::ResourceIdentifier;
use crate::errors::ClientError;
use crate::registry;
use crate::resource::Resource;

#[derive(Default)]
pub struct ResourcePool {
    resources: Vec<Resource>,
    index: HashMap<ResourceIdentifier, usize>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the pool with caller-supplied mapping targets before a
    /// deserialization begins.
    pub fn seed(&mut self, targets: impl IntoIterator<Item = Resource>) {
        for resource in targets {
            self.insert(resource);
        }
    }

    fn insert(&mut self, resource: Resource) {
        let idx = self.resources.len();
        if let Some(identifier) = resource.identifier() {
            self.index.entry(identifier).or_insert(idx);
        }
        self.resources.push(resource);
    }

    pub fn find(&self, resource_type: &str, id: &str) -> Option<Resource> {
        let identifier = ResourceIdentifier::new(resource_type, id);
        self.index.get(&identifier).map(|&idx| self.resources[idx].clone())
    }

    /// Creates a fresh, empty, type-tagged resource. Fails if the type was
    /// never registered.
    pub fn instantiate(&self, resource_type: &str) -> Result<Resource, ClientError> {
        if !registry::is_registered(resource_type) {
            return Err(ClientError::ResourceTypeUnregistered(resource_type.to_string()));
        }
        Ok(Resource::new(resource_type))
    }

    /// The positional `index`-th resource already in the pool whose type
    /// matches, if any — used to find a mapping target whose id is not yet
    /// known at dispense time.
    fn nth_of_type(&self, resource_type: &str, index: usize) -> Option<usize> {
        self.resources
            .iter()
            .enumerate()
            .filter(|(_, r)| r.resource_type() == resource_type)
            .nth(index)
            .map(|(i, _)| i)
    }

    /// `dispense(type, id, index?)`: the C4 algorithm.
    ///
    /// 1. Exact `(type, id)` match in the pool wins.
    /// 2. Else, if `index` is given and the pool holds at least `index + 1`
    ///    resources of `type`, adopt that positional resource (assigning it
    ///    this id, and indexing it for future exact lookups).
    /// 3. Else, instantiate fresh, assign the id, and register it.
    pub fn dispense(
        &mut self,
        resource_type: &str,
        id: &str,
        index: Option<usize>,
    ) -> Result<Resource, ClientError> {
        if let Some(existing) = self.find(resource_type, id) {
            return Ok(existing);
        }

        if let Some(position) = index {
            if let Some(slot) = self.nth_of_type(resource_type, position) {
                let resource = self.resources[slot].clone();
                resource.set_id(id);
                self.index.insert(ResourceIdentifier::new(resource_type, id), slot);
                return Ok(resource);
            }
        }

        let resource = self.instantiate(resource_type)?;
        resource.set_id(id);
        self.insert(resource.clone());
        Ok(resource)
    }

    pub fn all(&self) -> &[Resource] {
        &self.resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::FieldDescriptor;
    use serial_test::serial;

    fn setup() {
        registry::clear_registry();
        registry::register_resource_type("foos", vec![FieldDescriptor::plain("stringAttribute")]);
        registry::register_resource_type("bars", vec![]);
    }

    #[test]
    #[serial]
    fn dispense_dedups_by_type_and_id() {
        setup();
        let mut pool = ResourcePool::new();
        let r1 = pool.dispense("foos", "1", None).unwrap();
        let r2 = pool.dispense("foos", "1", None).unwrap();
        assert!(r1.same_instance(&r2));
        assert_eq!(pool.all().len(), 1);
    }

    #[test]
    #[serial]
    fn dispense_adopts_positional_mapping_target() {
        setup();
        let target = Resource::new("foos");
        let mut pool = ResourcePool::new();
        pool.seed([target.clone()]);

        let dispensed = pool.dispense("foos", "server-assigned-1", Some(0)).unwrap();
        assert!(dispensed.same_instance(&target));
        assert_eq!(dispensed.id(), Some("server-assigned-1".to_string()));

        // A second dispense with the same (type, id) now finds it by exact match.
        let again = pool.dispense("foos", "server-assigned-1", None).unwrap();
        assert!(again.same_instance(&target));
    }

    #[test]
    #[serial]
    fn dispense_of_unregistered_type_fails() {
        setup();
        let mut pool = ResourcePool::new();
        let err = pool.dispense("bazzes", "1", None).unwrap_err();
        assert!(matches!(err, ClientError::ResourceTypeUnregistered(_)));
    }
}
