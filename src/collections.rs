//! Collections: `ResourceCollection` and `LinkedResourceCollection`.

use crate::resource::{Resource, RelationshipLinkage};

/// A `(type, id)` pair sufficient to dedup against the identity pool
/// without a separate fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentifier {
    pub resource_type: String,
    pub id: String,
}

impl ResourceIdentifier {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self { resource_type: resource_type.into(), id: id.into() }
    }
}

/// An ordered collection of resources as returned from a primary endpoint
/// (`GET /foos`), carrying the pagination links the server sent along with
/// it. Iteration order is the server's; `len()` is the page length, not a
/// total count.
#[derive(Debug, Clone, Default)]
pub struct ResourceCollection {
    pub resources: Vec<Resource>,
    pub resources_url: Option<String>,
    pub next_url: Option<String>,
    pub previous_url: Option<String>,
}

impl ResourceCollection {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self { resources, resources_url: None, next_url: None, previous_url: None }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn first(&self) -> Option<&Resource> {
        self.resources.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.resources.iter()
    }

    /// Appends a newly-fetched page in place and replaces the pagination
    /// links from the new response — the mutation `loadNextPageOfCollection`
    /// performs on success.
    pub fn append_next_page(&mut self, mut page: ResourceCollection) {
        self.resources.append(&mut page.resources);
        self.next_url = page.next_url;
        self.previous_url = page.previous_url;
    }

    /// Prepends a newly-fetched page in place and replaces the pagination
    /// links — the mutation `loadPreviousPageOfCollection` performs.
    pub fn prepend_previous_page(&mut self, mut page: ResourceCollection) {
        page.resources.append(&mut self.resources);
        self.resources = page.resources;
        self.next_url = page.next_url;
        self.previous_url = page.previous_url;
    }
}

impl IntoIterator for ResourceCollection {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.into_iter()
    }
}

/// A to-many relationship's collection: the resolved list of related
/// resources, plus the raw linkage the server disclosed, plus the two
/// mutation deltas (`added`/`removed`) a save cascade consumes.
///
/// Modeled as a small state machine per the design notes: `pristine` state
/// has empty deltas; `add_resource`/`remove_resource` grow them;
/// `add_resource_as_existing` moves straight into `resources` without
/// touching `added`; a successful save clears both deltas.
#[derive(Debug, Clone, Default)]
pub struct LinkedResourceCollection {
    pub resources: Vec<Resource>,
    /// The relationship's `links.related` — fetches the full related collection.
    pub resources_url: Option<String>,
    /// The relationship's `links.self` — the `/relationships/<name>` endpoint.
    pub link_url: Option<String>,
    pub linkage: RelationshipLinkage,
    pub is_loaded: bool,
    pub(crate) added: Vec<Resource>,
    pub(crate) removed: Vec<Resource>,
}

impl LinkedResourceCollection {
    pub fn added_resources(&self) -> &[Resource] {
        &self.added
    }

    pub fn removed_resources(&self) -> &[Resource] {
        &self.removed
    }

    fn contains(list: &[Resource], target: &Resource) -> bool {
        list.iter().any(|r| match (r.identifier(), target.identifier()) {
            (Some(a), Some(b)) => a == b,
            _ => r.same_instance(target),
        })
    }

    /// Adds a resource to the in-memory collection and enqueues it for the
    /// save cascade's to-many POST, unless it was already present.
    pub fn add_resource(&mut self, resource: Resource) {
        if Self::contains(&self.resources, &resource) {
            return;
        }
        self.resources.push(resource.clone());
        self.removed.retain(|r| !r.same_instance(&resource) && r.identifier() != resource.identifier());
        self.added.push(resource);
    }

    /// Marks a resource as already linked server-side: it joins `resources`
    /// but is not enqueued for the add cascade.
    pub fn add_resource_as_existing(&mut self, resource: Resource) {
        if !Self::contains(&self.resources, &resource) {
            self.resources.push(resource);
        }
    }

    /// Removes a resource from the in-memory collection. If it was only
    /// ever a pending addition (never confirmed server-side), the addition
    /// is simply cancelled rather than generating a remove call.
    pub fn remove_resource(&mut self, resource: &Resource) {
        self.resources.retain(|r| !r.same_instance(resource) && r.identifier() != resource.identifier());
        let was_pending_add = {
            let before = self.added.len();
            self.added.retain(|r| !r.same_instance(resource) && r.identifier() != resource.identifier());
            self.added.len() != before
        };
        if !was_pending_add && !Self::contains(&self.removed, resource) {
            self.removed.push(resource.clone());
        }
    }

    /// Clears both deltas after a successful save cascade.
    pub fn clear_deltas(&mut self) {
        self.added.clear();
        self.removed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(id: &str) -> Resource {
        let r = Resource::new("bars");
        r.set_id(id);
        r
    }

    #[test]
    fn add_then_remove_cancels_pending_addition() {
        let mut collection = LinkedResourceCollection::default();
        collection.add_resource(bar("13"));
        assert_eq!(collection.added_resources().len(), 1);

        collection.remove_resource(&bar("13"));
        assert!(collection.added_resources().is_empty());
        assert!(collection.removed_resources().is_empty());
    }

    #[test]
    fn remove_of_existing_resource_enqueues_delete() {
        let mut collection = LinkedResourceCollection::default();
        collection.add_resource_as_existing(bar("11"));
        collection.remove_resource(&bar("11"));
        assert_eq!(collection.removed_resources().len(), 1);
        assert!(collection.resources.is_empty());
    }

    #[test]
    fn deltas_clear_after_save() {
        let mut collection = LinkedResourceCollection::default();
        collection.add_resource(bar("13"));
        collection.clear_deltas();
        assert!(collection.added_resources().is_empty());
    }

    #[test]
    fn next_page_append_replaces_links() {
        let mut c = ResourceCollection::new(vec![bar("1")]);
        c.next_url = Some("page2".into());
        let mut page2 = ResourceCollection::new(vec![bar("2")]);
        page2.next_url = Some("page3".into());
        page2.previous_url = Some("page1".into());
        c.append_next_page(page2);
        assert_eq!(c.len(), 2);
        assert_eq!(c.next_url.as_deref(), Some("page3"));
        assert_eq!(c.previous_url.as_deref(), Some("page1"));
    }
}
