//! Client facade, configuration, and the operation queue.
//!
//! Thin wrappers over [`crate::operations`] that return `tokio` join handles
//! as future-like results, and enforce the scheduling model: writes run one
//! at a time behind a serial lock, reads run with a bounded
//! [`tokio::sync::Semaphore`].

use std::sync::Arc;

use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tracing::instrument;

use crate::collections::ResourceCollection;
use crate::deserializer::Deserializer;
use crate::errors::{ClientError, ClientResult};
use crate::operations::{self, CancellationToken, OperationState};
use crate::query::Query;
use crate::resource::Resource;
use crate::router::Router;
use crate::serializer::Serializer;
use crate::transport::Transport;
use crate::value_formatters::{DasherizingKeyFormatter, KeyFormatter};

const DEFAULT_MAX_READ_CONCURRENCY: usize = 8;

/// Immutable, process-wide client settings, assembled once at construction.
/// The resource-type registry and value-formatter registry are process-wide
/// and treated as effectively immutable after the first operation is issued.
pub struct ClientConfig {
    pub base_url: String,
    pub max_read_concurrency: usize,
}

pub struct ClientBuilder {
    base_url: String,
    transport: Arc<dyn Transport>,
    key_formatter: Arc<dyn KeyFormatter>,
    max_read_concurrency: usize,
}

impl ClientBuilder {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            key_formatter: Arc::new(DasherizingKeyFormatter),
            max_read_concurrency: DEFAULT_MAX_READ_CONCURRENCY,
        }
    }

    pub fn key_formatter(mut self, key_formatter: Arc<dyn KeyFormatter>) -> Self {
        self.key_formatter = key_formatter;
        self
    }

    pub fn max_read_concurrency(mut self, n: usize) -> Self {
        self.max_read_concurrency = n.max(1);
        self
    }

    pub fn build(self) -> Client {
        let router = Arc::new(Router::new(self.base_url.clone(), self.key_formatter.clone()));
        let serializer = Arc::new(Serializer::new(self.key_formatter.clone()));
        let deserializer = Arc::new(Deserializer::new(self.key_formatter));
        Client {
            config: Arc::new(ClientConfig { base_url: self.base_url, max_read_concurrency: self.max_read_concurrency }),
            transport: self.transport,
            router,
            serializer,
            deserializer,
            write_lock: Arc::new(AsyncMutex::new(())),
            read_semaphore: Arc::new(Semaphore::new(self.max_read_concurrency)),
        }
    }
}

/// A handle to an in-flight or finished operation: joins the caller to the
/// background task, and exposes the shared [`CancellationToken`] so the
/// caller can ask it to stop.
pub struct OperationHandle<T> {
    join: tokio::task::JoinHandle<ClientResult<T>>,
    cancel: CancellationToken,
    state: Arc<std::sync::Mutex<OperationState>>,
}

impl<T: Send + 'static> OperationHandle<T> {
    fn spawn<F>(cancel: CancellationToken, fut: F) -> Self
    where
        F: std::future::Future<Output = ClientResult<T>> + Send + 'static,
    {
        let state = Arc::new(std::sync::Mutex::new(OperationState::Ready));
        let state_for_task = state.clone();
        let join = tokio::spawn(async move {
            *state_for_task.lock().unwrap() = OperationState::Executing;
            let result = fut.await;
            *state_for_task.lock().unwrap() = OperationState::Finished;
            result
        });
        Self { join, cancel, state }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The operation's current lifecycle stage.
    pub fn state(&self) -> OperationState {
        *self.state.lock().unwrap()
    }

    /// Awaits the operation's `Finished` transition and returns its result.
    pub async fn wait(self) -> ClientResult<T> {
        match self.join.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Cancelled),
        }
    }
}

#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    router: Arc<Router>,
    serializer: Arc<Serializer>,
    deserializer: Arc<Deserializer>,
    /// Held for the duration of a save's full cascade so two concurrent
    /// saves never interleave their relationship sub-operations.
    write_lock: Arc<AsyncMutex<()>>,
    read_semaphore: Arc<Semaphore>,
}

impl Client {
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `find(query)`.
    #[instrument(skip(self, query))]
    pub fn find(&self, query: Query) -> OperationHandle<ResourceCollection> {
        self.find_with_targets(query, Vec::new())
    }

    /// `find(ids, type)`.
    pub fn find_by_ids(&self, resource_type: impl Into<String>, ids: impl IntoIterator<Item = impl Into<String>>) -> OperationHandle<ResourceCollection> {
        self.find(Query::for_ids(resource_type, ids))
    }

    /// `find(type)` — every resource of a type.
    pub fn find_all(&self, resource_type: impl Into<String>) -> OperationHandle<ResourceCollection> {
        self.find(Query::for_type(resource_type))
    }

    fn find_with_targets(&self, query: Query, mapping_targets: Vec<Resource>) -> OperationHandle<ResourceCollection> {
        let transport = self.transport.clone();
        let router = self.router.clone();
        let deserializer = self.deserializer.clone();
        let semaphore = self.read_semaphore.clone();
        let token = CancellationToken::new();
        let cancel_for_task = token.clone();

        OperationHandle::spawn(token, async move {
            let _permit = semaphore.acquire_owned().await.map_err(|_| ClientError::Cancelled)?;
            operations::fetch(transport, router, deserializer, query, mapping_targets, cancel_for_task).await
        })
    }

    /// `findOne(id, type)` / `findOne(query)`: fails with `ResourceNotFound`
    /// when the resulting collection is empty.
    pub fn find_one(&self, query: Query) -> OperationHandle<Resource> {
        let transport = self.transport.clone();
        let router = self.router.clone();
        let deserializer = self.deserializer.clone();
        let semaphore = self.read_semaphore.clone();
        let token = CancellationToken::new();
        let cancel_for_task = token.clone();

        OperationHandle::spawn(token, async move {
            let _permit = semaphore.acquire_owned().await.map_err(|_| ClientError::Cancelled)?;
            let collection = operations::fetch(transport, router, deserializer, query, Vec::new(), cancel_for_task).await?;
            collection.first().cloned().ok_or(ClientError::ResourceNotFound)
        })
    }

    pub fn find_one_by_id(&self, resource_type: impl Into<String>, id: impl Into<String>) -> OperationHandle<Resource> {
        self.find_one(Query::for_ids(resource_type, [id.into()]))
    }

    /// `save(resource)`.
    pub fn save(&self, resource: Resource) -> OperationHandle<Resource> {
        let transport = self.transport.clone();
        let router = self.router.clone();
        let serializer = self.serializer.clone();
        let deserializer = self.deserializer.clone();
        let write_lock = self.write_lock.clone();
        let token = CancellationToken::new();
        let cancel_for_task = token.clone();

        OperationHandle::spawn(token, async move {
            let _guard = write_lock.lock().await;
            operations::save(transport, router, serializer, deserializer, resource, cancel_for_task).await
        })
    }

    /// `delete(resource)`.
    pub fn delete(&self, resource: Resource) -> OperationHandle<()> {
        let transport = self.transport.clone();
        let router = self.router.clone();
        let deserializer = self.deserializer.clone();
        let write_lock = self.write_lock.clone();
        let token = CancellationToken::new();
        let cancel_for_task = token.clone();

        OperationHandle::spawn(token, async move {
            let _guard = write_lock.lock().await;
            operations::delete(transport, router, deserializer, resource, cancel_for_task).await
        })
    }

    /// `loadNextPageOfCollection(c)`: fails with `NextPageNotAvailable` when
    /// `nextURL` is absent; mutates `collection` in place on success.
    ///
    /// Unlike the other facade methods this is a plain `async fn` rather
    /// than an [`OperationHandle`]-returning spawn: the page has to be
    /// spliced into `collection` synchronously once it arrives, which a
    /// detached background task cannot do against a caller-held `&mut`.
    pub async fn load_next_page(&self, collection: &mut ResourceCollection) -> ClientResult<()> {
        let Some(next_url) = collection.next_url.clone() else {
            return Err(ClientError::NextPageNotAvailable);
        };
        let page = self.fetch_url(next_url).await?;
        collection.append_next_page(page);
        Ok(())
    }

    /// `loadPreviousPageOfCollection(c)`: symmetric rule for `previousURL`.
    pub async fn load_previous_page(&self, collection: &mut ResourceCollection) -> ClientResult<()> {
        let Some(previous_url) = collection.previous_url.clone() else {
            return Err(ClientError::PreviousPageNotAvailable);
        };
        let page = self.fetch_url(previous_url).await?;
        collection.prepend_previous_page(page);
        Ok(())
    }

    async fn fetch_url(&self, url: String) -> ClientResult<ResourceCollection> {
        let _permit = self.read_semaphore.clone().acquire_owned().await.map_err(|_| ClientError::Cancelled)?;
        operations::fetch(
            self.transport.clone(),
            self.router.clone(),
            self.deserializer.clone(),
            Query::for_url(url),
            Vec::new(),
            CancellationToken::new(),
        )
        .await
    }

    /// `ensure(resource, queryCallback?)`: no-ops if already loaded;
    /// otherwise fetches with `resource` as the mapping target so the same
    /// instance is filled in place. `query_callback`, when given, can
    /// customize the fetch query (adding `include`s, for instance) before
    /// it is issued.
    pub fn ensure<F>(&self, resource: Resource, query_callback: Option<F>) -> OperationHandle<Resource>
    where
        F: FnOnce(Query) -> Query + Send + 'static,
    {
        if resource.is_loaded() {
            let token = CancellationToken::new();
            return OperationHandle::spawn(token, async move { Ok(resource) });
        }

        let Some(id) = resource.id() else {
            let token = CancellationToken::new();
            return OperationHandle::spawn(token, async { Err(ClientError::ResourceIDMissing) });
        };
        let mut query = Query::for_ids(resource.resource_type(), [id]);
        if let Some(customize) = query_callback {
            query = customize(query);
        }

        let transport = self.transport.clone();
        let router = self.router.clone();
        let deserializer = self.deserializer.clone();
        let semaphore = self.read_semaphore.clone();
        let token = CancellationToken::new();
        let cancel_for_task = token.clone();

        OperationHandle::spawn(token, async move {
            let _permit = semaphore.acquire_owned().await.map_err(|_| ClientError::Cancelled)?;
            operations::fetch(transport, router, deserializer, query, vec![resource.clone()], cancel_for_task).await?;
            Ok(resource)
        })
    }
}
