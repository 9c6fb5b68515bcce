//! A client library core for hypermedia APIs that follow the JSON:API
//! conventions: resource objects with `type`/`id`, typed relationships,
//! compound documents, link-based pagination, and a standard error shape.
//!
//! The crate is the mapping engine between wire documents and a typed
//! object graph, plus the operation pipeline that drives it against a
//! pluggable [`transport::Transport`]. It does not parse raw bytes itself
//! beyond `serde_json`, does not cache across calls, and does not persist
//! anything to disk — those are application concerns layered on top.

pub mod client;
pub mod collections;
pub mod descriptors;
pub mod deserializer;
pub mod errors;
pub mod operations;
pub mod pool;
pub mod query;
pub mod registry;
pub mod resource;
pub mod router;
pub mod serializer;
pub mod transport;
pub mod value_formatters;

pub use client::{Client, ClientBuilder, ClientConfig, OperationHandle};
pub use collections::{LinkedResourceCollection, ResourceCollection, ResourceIdentifier};
pub use descriptors::{FieldDescriptor, FieldMeta};
pub use deserializer::{ApiError, Deserializer, JsonApiDocument};
pub use errors::{ClientError, ClientResult, ErrorDomain};
pub use operations::{CancellationToken, OperationState};
pub use query::{ComparisonOperator, ComparisonPredicate, Pagination, Query, SortDescriptor};
pub use registry::register_resource_type;
pub use resource::{RelationshipData, RelationshipLinkage, Resource, ToOneSlot};
pub use router::Router;
pub use serializer::{SerializationOptions, Serializer};
pub use transport::{Method, Transport, TransportError, TransportResponse};
pub use value_formatters::{DasherizingKeyFormatter, IdentityKeyFormatter, KeyFormatter};

#[cfg(feature = "reqwest-transport")]
pub use transport::ReqwestTransport;
