//! Resource + ResourceData.
//!
//! A [`Resource`] is a cheap, cloneable handle (`Arc<Mutex<ResourceData>>`)
//! around the actual instance state. Cloning a `Resource` gives you another
//! reference to the *same* instance, which is what lets the identity pool
//! hand out one shared object per `(type, id)` within a deserialization
//! — every relationship that points at resource `("bars", "10")` ends up
//! holding a clone of the exact same handle.
//!
//! Field values live in an attribute-slot map (`HashMap<String, Value>`)
//! rather than behind generated per-field accessors, avoiding a
//! codegen/reflection layer for what is otherwise declarative schema.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::collections::{LinkedResourceCollection, ResourceIdentifier};

/// The wire-disclosed state of a relationship, independent of whatever is
/// resolved in memory. Three states so `data: null` is distinguishable from
/// an absent `data` key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RelationshipLinkage {
    /// The server did not include a `data` member for this relationship.
    #[default]
    Undisclosed,
    /// `data` was present and empty (`null` for to-one, `[]` for to-many).
    Empty,
    /// `data` was present and non-empty.
    List(Vec<ResourceIdentifier>),
}

/// Raw per-relationship metadata as read off the wire: links and linkage,
/// before any attempt to resolve linkage against the identity pool.
#[derive(Debug, Clone, Default)]
pub struct RelationshipData {
    pub self_url: Option<String>,
    pub related_url: Option<String>,
    pub linkage: RelationshipLinkage,
}

/// The in-memory resolved value of a to-one relationship slot.
#[derive(Debug, Clone, Default)]
pub enum ToOneSlot {
    /// Never populated (neither extracted from a document nor set by user code).
    #[default]
    Unset,
    /// Explicitly known to be empty (`data: null`).
    Empty,
    /// Points at a (possibly unloaded) resource.
    Linked(Resource),
}

impl ToOneSlot {
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            ToOneSlot::Linked(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, ToOneSlot::Unset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelationshipSlotKind {
    ToOne,
    ToMany,
}

enum RelationshipSlot {
    ToOne(ToOneSlot),
    ToMany(LinkedResourceCollection),
}

impl RelationshipSlot {
    fn kind(&self) -> RelationshipSlotKind {
        match self {
            RelationshipSlot::ToOne(_) => RelationshipSlotKind::ToOne,
            RelationshipSlot::ToMany(_) => RelationshipSlotKind::ToMany,
        }
    }
}

/// The actual state backing a [`Resource`] handle.
pub struct ResourceData {
    pub resource_type: String,
    pub id: Option<String>,
    pub url: Option<String>,
    pub is_loaded: bool,
    pub meta: Map<String, Value>,
    attributes: HashMap<String, Value>,
    dirty: HashSet<String>,
    relationships: HashMap<String, RelationshipData>,
    relationship_slots: HashMap<String, RelationshipSlot>,
}

impl ResourceData {
    fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: None,
            url: None,
            is_loaded: false,
            meta: Map::new(),
            attributes: HashMap::new(),
            dirty: HashSet::new(),
            relationships: HashMap::new(),
            relationship_slots: HashMap::new(),
        }
    }

    /// Clears every field slot and marks the instance unloaded, per the
    /// unload law: `id`, `resource_type`, and `url` survive.
    fn unload(&mut self) {
        self.is_loaded = false;
        self.attributes.clear();
        self.dirty.clear();
        self.relationships.clear();
        self.relationship_slots.clear();
        self.meta.clear();
    }
}

/// A cheap, cloneable handle onto shared resource state.
///
/// Two `Resource` clones that both came from `dispense`-ing the same
/// `(type, id)` pair within one deserialization refer to the exact same
/// underlying `ResourceData` — clone equality, not structural equality, is
/// the identity pool's guarantee.
#[derive(Clone)]
pub struct Resource(Arc<Mutex<ResourceData>>);

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Resource(Arc::new(Mutex::new(ResourceData::new(resource_type))))
    }

    fn lock(&self) -> MutexGuard<'_, ResourceData> {
        self.0.lock().expect("resource mutex poisoned")
    }

    pub fn same_instance(&self, other: &Resource) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn resource_type(&self) -> String {
        self.lock().resource_type.clone()
    }

    pub fn id(&self) -> Option<String> {
        self.lock().id.clone()
    }

    pub fn set_id(&self, id: impl Into<String>) {
        self.lock().id = Some(id.into());
    }

    /// `(type, id)` identifier, if this resource has been assigned an id.
    pub fn identifier(&self) -> Option<ResourceIdentifier> {
        let data = self.lock();
        data.id.clone().map(|id| ResourceIdentifier { resource_type: data.resource_type.clone(), id })
    }

    pub fn url(&self) -> Option<String> {
        self.lock().url.clone()
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.lock().url = Some(url.into());
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_loaded
    }

    pub fn set_loaded(&self, loaded: bool) {
        self.lock().is_loaded = loaded;
    }

    pub fn meta(&self) -> Map<String, Value> {
        self.lock().meta.clone()
    }

    pub fn set_meta(&self, meta: Map<String, Value>) {
        self.lock().meta = meta;
    }

    /// Reads an attribute slot. Returns `None` if the slot was never set.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.lock().attributes.get(name).cloned()
    }

    /// Writes an attribute slot and marks the field dirty.
    pub fn set_attribute(&self, name: impl Into<String>, value: Value) {
        let mut data = self.lock();
        let name = name.into();
        data.dirty.insert(name.clone());
        data.attributes.insert(name, value);
    }

    /// Writes an attribute slot without marking it dirty — used by the
    /// deserializer, since values arriving from the server are by
    /// definition in sync with the server.
    pub(crate) fn set_attribute_clean(&self, name: impl Into<String>, value: Value) {
        self.lock().attributes.insert(name.into(), value);
    }

    pub fn dirty_fields(&self) -> HashSet<String> {
        self.lock().dirty.clone()
    }

    pub fn clear_dirty(&self) {
        self.lock().dirty.clear();
    }

    pub fn relationship_data(&self, name: &str) -> Option<RelationshipData> {
        self.lock().relationships.get(name).cloned()
    }

    pub(crate) fn set_relationship_data(&self, name: impl Into<String>, data: RelationshipData) {
        self.lock().relationships.insert(name.into(), data);
    }

    pub fn to_one(&self, name: &str) -> ToOneSlot {
        match self.lock().relationship_slots.get(name) {
            Some(RelationshipSlot::ToOne(slot)) => slot.clone(),
            _ => ToOneSlot::Unset,
        }
    }

    /// Sets a to-one slot unconditionally (used by user code and by save
    /// success handling). The deserializer instead uses
    /// [`Resource::extract_to_one`], which only assigns when the slot is
    /// empty or unloaded.
    pub fn set_to_one(&self, name: impl Into<String>, slot: ToOneSlot) {
        self.lock().relationship_slots.insert(name.into(), RelationshipSlot::ToOne(slot));
    }

    /// Assigns a to-one slot only if it is currently unset, or points at an
    /// unloaded resource — the extraction rule used by the deserializer so
    /// that re-extracting a compound document never clobbers an
    /// already-loaded relationship with a stub. Assigning via this method
    /// (rather than [`Resource::set_to_one`]) is what distinguishes a
    /// server-disclosed update from a plain user-code write.
    pub(crate) fn extract_to_one(&self, name: &str, slot: ToOneSlot) {
        let mut data = self.lock();
        let should_assign = match data.relationship_slots.get(name) {
            None => true,
            Some(RelationshipSlot::ToOne(ToOneSlot::Unset)) => true,
            Some(RelationshipSlot::ToOne(ToOneSlot::Linked(existing))) => !existing.is_loaded(),
            Some(RelationshipSlot::ToOne(ToOneSlot::Empty)) => true,
            Some(RelationshipSlot::ToMany(_)) => false,
        };
        if should_assign {
            data.relationship_slots.insert(name.to_string(), RelationshipSlot::ToOne(slot));
        }
    }

    pub fn to_many(&self, name: &str) -> LinkedResourceCollection {
        match self.lock().relationship_slots.get(name) {
            Some(RelationshipSlot::ToMany(collection)) => collection.clone(),
            _ => LinkedResourceCollection::default(),
        }
    }

    pub fn set_to_many(&self, name: impl Into<String>, collection: LinkedResourceCollection) {
        self.lock().relationship_slots.insert(name.into(), RelationshipSlot::ToMany(collection));
    }

    /// Replaces a to-many slot iff linkage was disclosed or the slot was
    /// previously empty.
    pub(crate) fn extract_to_many(&self, name: &str, collection: LinkedResourceCollection) {
        let mut data = self.lock();
        let has_linkage = collection.linkage != RelationshipLinkage::Undisclosed;
        let slot_was_empty = !matches!(data.relationship_slots.get(name), Some(RelationshipSlot::ToMany(c)) if !c.resources.is_empty());
        if has_linkage || slot_was_empty {
            data.relationship_slots.insert(name.to_string(), RelationshipSlot::ToMany(collection));
        }
    }

    pub fn unload(&self) {
        self.lock().unload();
    }

    pub fn relationship_names(&self) -> Vec<String> {
        self.lock().relationship_slots.keys().cloned().collect()
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.lock();
        f.debug_struct("Resource")
            .field("resource_type", &data.resource_type)
            .field("id", &data.id)
            .field("is_loaded", &data.is_loaded)
            .finish()
    }
}
