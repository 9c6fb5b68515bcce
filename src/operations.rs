//! The operation pipeline: fetch, save, delete, and the per-relationship
//! cascade a save triggers. Each operation is a free async function rather
//! than a trait object — the client facade is what gives them a
//! `Ready -> Executing -> Finished` lifecycle (tracked on
//! [`crate::client::OperationHandle`]) and cancellation, by racing the call
//! against a [`CancellationToken`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::collections::ResourceCollection;
use crate::deserializer::Deserializer;
use crate::descriptors::FieldDescriptor;
use crate::errors::{ClientError, ClientResult};
use crate::query::Query;
use crate::registry;
use crate::resource::{Resource, ToOneSlot};
use crate::router::Router;
use crate::serializer::{SerializationOptions, Serializer};
use crate::transport::{Method, Transport, TransportResponse};

/// The lifecycle every operation passes through exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Ready,
    Executing,
    Finished,
}

/// A cooperative cancellation signal. Cloning shares the same underlying
/// flag, so the client facade can hand one half to a spawned operation and
/// keep the other half as the caller's cancel switch.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)), notify: Arc::new(Notify::new()) }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.notify.notified().await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `fut` to completion on its own task, racing it against cancellation.
///
/// A cancellation observed before the transport call starts skips it
/// entirely. One observed mid-flight leaves the spawned task running
/// detached to completion — transports are not required to support
/// cancellation — but its result is discarded; the caller sees `Cancelled`
/// immediately instead of waiting on it.
async fn run_cancellable<F, T>(token: CancellationToken, fut: F) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>> + Send + 'static,
    T: Send + 'static,
{
    if token.is_cancelled() {
        return Err(ClientError::Cancelled);
    }
    let handle = tokio::spawn(fut);
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ClientError::Cancelled),
        joined = handle => {
            match joined {
                Ok(result) => result,
                Err(_) => Err(ClientError::Cancelled),
            }
        }
    }
}

/// Issues the transport call and interprets its result: transport errors
/// propagate verbatim; a status in `[400, 599]` is an API failure whose
/// body is parsed for `errors[]` first, falling back to a bare
/// `NetworkError` when the body doesn't carry one. A status outside both the
/// success and API-failure ranges (a stray `1xx`/`3xx` the transport passed
/// through unresolved) is also a `NetworkError`, rather than silently
/// treated as success.
async fn execute_call(
    transport: &Arc<dyn Transport>,
    deserializer: &Deserializer,
    method: Method,
    url: &str,
    body: Option<Vec<u8>>,
) -> ClientResult<TransportResponse> {
    let response = transport.execute(method, url, body).await?;
    if response.is_api_failure() {
        if let Some(bytes) = &response.body {
            if let Ok(doc) = deserializer.deserialize(bytes, Vec::new()) {
                if !doc.errors.is_empty() {
                    return Err(ClientError::ServerError { code: response.status, errors: doc.errors });
                }
            }
        }
        return Err(ClientError::NetworkError { code: response.status });
    }
    if !response.is_success() {
        return Err(ClientError::NetworkError { code: response.status });
    }
    Ok(response)
}

/// **FetchOperation.** Builds a URL from the query, issues a `GET`, and
/// deserializes the response into a [`ResourceCollection`] whose pagination
/// links come from the document's top-level `links`.
pub async fn fetch(
    transport: Arc<dyn Transport>,
    router: Arc<Router>,
    deserializer: Arc<Deserializer>,
    query: Query,
    mapping_targets: Vec<Resource>,
    token: CancellationToken,
) -> ClientResult<ResourceCollection> {
    let url = router.url_for_query(&query);
    run_cancellable(token, async move {
        let response = execute_call(&transport, &deserializer, Method::Get, &url, None).await?;
        let bytes = response.body.unwrap_or_default();
        let doc = deserializer.deserialize(&bytes, mapping_targets)?;
        if let Some(error) = doc.first_error() {
            return Err(ClientError::ServerError { code: response.status, errors: vec![error.clone()] });
        }
        let mut collection = ResourceCollection::new(doc.data);
        collection.resources_url = doc.links.get("self").cloned();
        collection.next_url = doc.links.get("next").cloned();
        collection.previous_url = doc.links.get("previous").cloned();
        Ok(collection)
    })
    .await
}

/// **DeleteOperation.** `DELETE` to the resource's canonical URL; success
/// iff the transport call and status both succeed.
pub async fn delete(
    transport: Arc<dyn Transport>,
    router: Arc<Router>,
    deserializer: Arc<Deserializer>,
    resource: Resource,
    token: CancellationToken,
) -> ClientResult<()> {
    let id = resource.id().ok_or(ClientError::ResourceIDMissing)?;
    let query = Query::for_ids(resource.resource_type(), [id]);
    let url = resource.url().unwrap_or_else(|| router.url_for_query(&query));
    run_cancellable(token, async move {
        execute_call(&transport, &deserializer, Method::Delete, &url, None).await?;
        Ok(())
    })
    .await
}

/// **SaveOperation.** `POST` a brand-new resource or `PATCH` an existing
/// one; on success, deserialize the response *into* the same instance so
/// server-assigned ids/attributes flow back, then — for an existing
/// resource — chain the relationship cascade.
pub async fn save(
    transport: Arc<dyn Transport>,
    router: Arc<Router>,
    serializer: Arc<Serializer>,
    deserializer: Arc<Deserializer>,
    resource: Resource,
    token: CancellationToken,
) -> ClientResult<Resource> {
    let is_new = resource.id().is_none();
    let (method, options) = if is_new {
        (Method::Post, SerializationOptions::create())
    } else {
        (Method::Patch, SerializationOptions::update())
    };

    let url = if is_new {
        router.url_for_resource_type(&resource.resource_type())
    } else {
        let id = resource.id().expect("checked above");
        resource.url().unwrap_or_else(|| router.url_for_query(&Query::for_ids(resource.resource_type(), [id])))
    };

    let body = serializer.serialize_resources(std::slice::from_ref(&resource), options)?;

    let saved = {
        let resource = resource.clone();
        let transport = transport.clone();
        let deserializer = deserializer.clone();
        run_cancellable(token.clone(), async move {
            let response = execute_call(&transport, &deserializer, method, &url, Some(body)).await?;
            let bytes = response.body.unwrap_or_default();
            if !bytes.is_empty() {
                deserializer.deserialize(&bytes, vec![resource.clone()])?;
            }
            resource.clear_dirty();
            Ok(resource)
        })
        .await?
    };

    if !is_new {
        relationship_cascade(transport, router, serializer, deserializer, saved.clone(), token).await?;
    }

    Ok(saved)
}

/// **RelationshipOperation.** Issues every to-one replace first, then every
/// to-many add/remove, strictly sequentially within each pass — halting at
/// the first failure, which is what gives the save cascade its ordering
/// guarantee. The two passes run in that fixed order regardless of how the
/// resource type declares its relationship fields.
pub async fn relationship_cascade(
    transport: Arc<dyn Transport>,
    router: Arc<Router>,
    serializer: Arc<Serializer>,
    deserializer: Arc<Deserializer>,
    resource: Resource,
    token: CancellationToken,
) -> ClientResult<()> {
    let descriptors = registry::descriptors_for(&resource.resource_type())?;

    for descriptor in descriptors.iter().filter(|d| matches!(d, FieldDescriptor::ToOneRelationship(_))) {
        replace_to_one(&transport, &router, &serializer, &deserializer, &resource, descriptor, &token).await?;
    }
    for descriptor in descriptors.iter().filter(|d| matches!(d, FieldDescriptor::ToManyRelationship(_))) {
        mutate_to_many(&transport, &router, &serializer, &deserializer, &resource, descriptor, &token).await?;
    }

    Ok(())
}

async fn replace_to_one(
    transport: &Arc<dyn Transport>,
    router: &Router,
    serializer: &Serializer,
    deserializer: &Arc<Deserializer>,
    resource: &Resource,
    descriptor: &FieldDescriptor,
    token: &CancellationToken,
) -> ClientResult<()> {
    let slot = resource.to_one(descriptor.name());
    if slot.is_unset() {
        return Ok(());
    }
    let Some(url) = router.url_for_relationship(resource, descriptor) else { return Ok(()) };
    let body = match &slot {
        ToOneSlot::Linked(related) => serializer.serialize_link_data_one(Some(related)),
        _ => serializer.serialize_link_data_one(None),
    };

    let transport = transport.clone();
    let deserializer = deserializer.clone();
    run_cancellable(token.clone(), async move {
        execute_call(&transport, &deserializer, Method::Patch, &url, Some(body)).await?;
        Ok(())
    })
    .await
}

async fn mutate_to_many(
    transport: &Arc<dyn Transport>,
    router: &Router,
    serializer: &Serializer,
    deserializer: &Arc<Deserializer>,
    resource: &Resource,
    descriptor: &FieldDescriptor,
    token: &CancellationToken,
) -> ClientResult<()> {
    let Some(url) = router.url_for_relationship(resource, descriptor) else { return Ok(()) };
    let collection = resource.to_many(descriptor.name());

    if !collection.added_resources().is_empty() {
        let body = serializer.serialize_link_data_many(collection.added_resources());
        let transport = transport.clone();
        let deserializer = deserializer.clone();
        let url = url.clone();
        run_cancellable(token.clone(), async move {
            execute_call(&transport, &deserializer, Method::Post, &url, Some(body)).await?;
            Ok(())
        })
        .await?;
    }

    if !collection.removed_resources().is_empty() {
        let body = serializer.serialize_link_data_many(collection.removed_resources());
        let transport = transport.clone();
        let deserializer = deserializer.clone();
        run_cancellable(token.clone(), async move {
            execute_call(&transport, &deserializer, Method::Delete, &url, Some(body)).await?;
            Ok(())
        })
        .await?;
    }

    let mut settled = collection;
    settled.clear_deltas();
    resource.set_to_many(descriptor.name(), settled);
    Ok(())
}
