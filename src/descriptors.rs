//! Declarative schema: field descriptors.
//!
//! A resource type is described once, at registration time, by an ordered
//! list of [`FieldDescriptor`]s. Descriptors are immutable and shared across
//! every instance of a type — instances hold only state (see
//! [`crate::resource::ResourceData`]), never schema, matching how the
//! teacher corpus keeps its entity descriptors in a process-wide registry
//! separate from instance data.

/// Common metadata every descriptor carries.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    /// Domain-side field name, used to read/write the attribute slot.
    pub name: String,
    /// Wire-side field name. Defaults to `name` when not overridden.
    pub serialized_name: String,
    /// Excluded from writes (serialization) when true.
    pub is_read_only: bool,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { serialized_name: name.clone(), name, is_read_only: false }
    }

    pub fn with_serialized_name(mut self, serialized_name: impl Into<String>) -> Self {
        self.serialized_name = serialized_name.into();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }
}

/// The default JSON:API date format: ISO-8601, UTC when unspecified.
pub const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-dd'T'HH:mm:ss.SSSZZZZZ";

#[derive(Debug, Clone)]
pub struct DateAttributeOptions {
    pub format: String,
}

impl Default for DateAttributeOptions {
    fn default() -> Self {
        Self { format: DEFAULT_DATE_FORMAT.to_string() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UrlAttributeOptions {
    /// Relative URLs in the wire payload are resolved against this base.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RelationshipMeta {
    pub meta: FieldMeta,
    /// The resource type string the relationship points at.
    pub related_type: String,
}

/// The closed set of schema elements a resource type can declare.
#[derive(Debug, Clone)]
pub enum FieldDescriptor {
    PlainAttribute(FieldMeta),
    BooleanAttribute(FieldMeta),
    DateAttribute(FieldMeta, DateAttributeOptions),
    UrlAttribute(FieldMeta, UrlAttributeOptions),
    ToOneRelationship(RelationshipMeta),
    ToManyRelationship(RelationshipMeta),
}

impl FieldDescriptor {
    pub fn plain(name: impl Into<String>) -> Self {
        FieldDescriptor::PlainAttribute(FieldMeta::new(name))
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        FieldDescriptor::BooleanAttribute(FieldMeta::new(name))
    }

    pub fn date(name: impl Into<String>) -> Self {
        FieldDescriptor::DateAttribute(FieldMeta::new(name), DateAttributeOptions::default())
    }

    pub fn date_with_format(name: impl Into<String>, format: impl Into<String>) -> Self {
        FieldDescriptor::DateAttribute(FieldMeta::new(name), DateAttributeOptions { format: format.into() })
    }

    pub fn url(name: impl Into<String>) -> Self {
        FieldDescriptor::UrlAttribute(FieldMeta::new(name), UrlAttributeOptions::default())
    }

    pub fn url_with_base(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        FieldDescriptor::UrlAttribute(
            FieldMeta::new(name),
            UrlAttributeOptions { base_url: Some(base_url.into()) },
        )
    }

    pub fn to_one(name: impl Into<String>, related_type: impl Into<String>) -> Self {
        FieldDescriptor::ToOneRelationship(RelationshipMeta {
            meta: FieldMeta::new(name),
            related_type: related_type.into(),
        })
    }

    pub fn to_many(name: impl Into<String>, related_type: impl Into<String>) -> Self {
        FieldDescriptor::ToManyRelationship(RelationshipMeta {
            meta: FieldMeta::new(name),
            related_type: related_type.into(),
        })
    }

    pub fn meta(&self) -> &FieldMeta {
        match self {
            FieldDescriptor::PlainAttribute(m) => m,
            FieldDescriptor::BooleanAttribute(m) => m,
            FieldDescriptor::DateAttribute(m, _) => m,
            FieldDescriptor::UrlAttribute(m, _) => m,
            FieldDescriptor::ToOneRelationship(r) => &r.meta,
            FieldDescriptor::ToManyRelationship(r) => &r.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut FieldMeta {
        match self {
            FieldDescriptor::PlainAttribute(m) => m,
            FieldDescriptor::BooleanAttribute(m) => m,
            FieldDescriptor::DateAttribute(m, _) => m,
            FieldDescriptor::UrlAttribute(m, _) => m,
            FieldDescriptor::ToOneRelationship(r) => &mut r.meta,
            FieldDescriptor::ToManyRelationship(r) => &mut r.meta,
        }
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    pub fn serialized_name(&self) -> &str {
        &self.meta().serialized_name
    }

    pub fn is_read_only(&self) -> bool {
        self.meta().is_read_only
    }

    pub fn with_serialized_name(mut self, serialized_name: impl Into<String>) -> Self {
        self.meta_mut().serialized_name = serialized_name.into();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.meta_mut().is_read_only = true;
        self
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self, FieldDescriptor::ToOneRelationship(_) | FieldDescriptor::ToManyRelationship(_))
    }

    pub fn is_attribute(&self) -> bool {
        !self.is_relationship()
    }

    /// The related resource type, for relationship descriptors.
    pub fn related_type(&self) -> Option<&str> {
        match self {
            FieldDescriptor::ToOneRelationship(r) => Some(&r.related_type),
            FieldDescriptor::ToManyRelationship(r) => Some(&r.related_type),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_name_defaults_to_name() {
        let d = FieldDescriptor::plain("stringAttribute");
        assert_eq!(d.name(), "stringAttribute");
        assert_eq!(d.serialized_name(), "stringAttribute");
    }

    #[test]
    fn serialized_name_can_be_overridden() {
        let d = FieldDescriptor::plain("stringAttribute").with_serialized_name("string-attribute");
        assert_eq!(d.serialized_name(), "string-attribute");
    }

    #[test]
    fn read_only_descriptors_are_flagged() {
        let d = FieldDescriptor::plain("createdAt").read_only();
        assert!(d.is_read_only());
    }

    #[test]
    fn relationship_descriptors_carry_related_type() {
        let d = FieldDescriptor::to_many("comments", "comments");
        assert_eq!(d.related_type(), Some("comments"));
        assert!(d.is_relationship());
    }
}
