//! End-to-end scenarios against a scripted [`MockTransport`]: find, save,
//! and the relationship cascade a save against an existing resource
//! triggers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jsonapi_client::{
    register_resource_type, Client, ClientBuilder, FieldDescriptor, Method, Resource, ToOneSlot, Transport,
    TransportError, TransportResponse,
};
use serde_json::json;
use serial_test::serial;

/// Replays a fixed sequence of responses and records every call it receives,
/// so cascade ordering can be asserted on afterward.
#[derive(Default)]
struct MockTransport {
    calls: Mutex<Vec<(Method, String, Option<Vec<u8>>)>>,
    responses: Mutex<Vec<TransportResponse>>,
}

impl MockTransport {
    fn with_responses(responses: Vec<TransportResponse>) -> Self {
        Self { calls: Mutex::new(Vec::new()), responses: Mutex::new(responses) }
    }

    fn calls(&self) -> Vec<(Method, String, Option<Vec<u8>>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push((method, url.to_string(), body));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(TransportError::Failed("no more scripted responses".to_string()));
        }
        Ok(responses.remove(0))
    }
}

fn json_response(status: u16, body: serde_json::Value) -> TransportResponse {
    TransportResponse { status, body: Some(serde_json::to_vec(&body).unwrap()) }
}

fn register_test_types() {
    register_resource_type(
        "foos",
        vec![
            FieldDescriptor::plain("stringAttribute"),
            FieldDescriptor::to_one("toOneAttribute", "bars"),
            FieldDescriptor::to_many("toManyAttribute", "bars"),
        ],
    );
    register_resource_type("bars", vec![FieldDescriptor::plain("name")]);
}

/// A stub to-one relationship comes back unloaded, with its `url` taken
/// from `links.related`.
#[tokio::test]
#[serial]
async fn find_one_success() {
    jsonapi_client::registry::clear_registry();
    register_test_types();

    let body = json!({
        "data": {
            "type": "foos",
            "id": "1",
            "attributes": { "string-attribute": "hello" },
            "relationships": {
                "to-one-attribute": {
                    "links": { "related": "http://example.com/bars/10" },
                    "data": { "type": "bars", "id": "10" }
                }
            }
        }
    });

    let transport = Arc::new(MockTransport::with_responses(vec![json_response(200, body)]));
    let client = ClientBuilder::new("http://example.com", transport.clone()).build();

    let foo = client.find_one_by_id("foos", "1").wait().await.unwrap();

    assert!(foo.is_loaded());
    assert_eq!(foo.id().as_deref(), Some("1"));
    let slot = foo.to_one("toOneAttribute");
    let bar = slot.resource().unwrap();
    assert!(!bar.is_loaded());
    assert_eq!(bar.url().as_deref(), Some("http://example.com/bars/10"));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, Method::Get);
    assert_eq!(calls[0].1, "http://example.com/foos/1");
}

/// Saving a brand-new resource sends a `POST` with no id, and the
/// server-assigned id flows back into the same instance.
#[tokio::test]
#[serial]
async fn save_new_resource() {
    jsonapi_client::registry::clear_registry();
    register_test_types();

    let response_body = json!({ "data": { "type": "foos", "id": "42", "attributes": { "string-attribute": "hi" } } });
    let transport = Arc::new(MockTransport::with_responses(vec![json_response(201, response_body)]));
    let client = ClientBuilder::new("http://example.com", transport.clone()).build();

    let foo = Resource::new("foos");
    foo.set_attribute("stringAttribute", json!("hi"));

    let saved = client.save(foo.clone()).wait().await.unwrap();
    assert!(saved.same_instance(&foo));
    assert_eq!(saved.id().as_deref(), Some("42"));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, Method::Post);
    assert_eq!(calls[0].1, "http://example.com/foos");
    let sent: serde_json::Value = serde_json::from_slice(calls[0].2.as_ref().unwrap()).unwrap();
    assert!(sent["data"].get("id").is_none());
}

/// Saving cascades in order: primary PATCH, then to-one PATCH, then
/// to-many POST, then to-many DELETE, each only after the previous
/// succeeds.
#[tokio::test]
#[serial]
async fn save_cascade_ordering() {
    jsonapi_client::registry::clear_registry();
    register_test_types();

    let foo = Resource::new("foos");
    foo.set_id("1");
    foo.set_loaded(true);

    let bar10 = Resource::new("bars");
    bar10.set_id("10");
    foo.set_to_one("toOneAttribute", ToOneSlot::Linked(bar10));

    let mut collection = jsonapi_client::LinkedResourceCollection::default();
    let bar13 = Resource::new("bars");
    bar13.set_id("13");
    collection.add_resource(bar13);
    let bar11 = Resource::new("bars");
    bar11.set_id("11");
    collection.add_resource_as_existing(bar11.clone());
    collection.remove_resource(&bar11);
    foo.set_to_many("toManyAttribute", collection);

    let transport = Arc::new(MockTransport::with_responses(vec![
        json_response(200, json!({ "data": { "type": "foos", "id": "1" } })),
        TransportResponse { status: 204, body: None },
        TransportResponse { status: 204, body: None },
        TransportResponse { status: 204, body: None },
    ]));
    let client = ClientBuilder::new("http://example.com", transport.clone()).build();

    client.save(foo).wait().await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], (Method::Patch, "http://example.com/foos/1".to_string(), calls[0].2.clone()));
    assert_eq!(calls[1].0, Method::Patch);
    assert_eq!(calls[1].1, "http://example.com/foos/1/relationships/to-one-attribute");
    assert_eq!(calls[2].0, Method::Post);
    assert_eq!(calls[2].1, "http://example.com/foos/1/relationships/to-many-attribute");
    assert_eq!(calls[3].0, Method::Delete);
    assert_eq!(calls[3].1, "http://example.com/foos/1/relationships/to-many-attribute");
}

/// If the to-one PATCH fails, the to-many calls never happen.
#[tokio::test]
#[serial]
async fn cascade_halts_on_first_failure() {
    jsonapi_client::registry::clear_registry();
    register_test_types();

    let foo = Resource::new("foos");
    foo.set_id("1");
    foo.set_loaded(true);
    let bar10 = Resource::new("bars");
    bar10.set_id("10");
    foo.set_to_one("toOneAttribute", ToOneSlot::Linked(bar10));

    let mut collection = jsonapi_client::LinkedResourceCollection::default();
    let bar13 = Resource::new("bars");
    bar13.set_id("13");
    collection.add_resource(bar13);
    foo.set_to_many("toManyAttribute", collection);

    let error_body = json!({ "errors": [{ "status": "422", "title": "Invalid" }] });
    let transport = Arc::new(MockTransport::with_responses(vec![
        json_response(200, json!({ "data": { "type": "foos", "id": "1" } })),
        json_response(422, error_body),
    ]));
    let client = ClientBuilder::new("http://example.com", transport.clone()).build();

    let err = client.save(foo).wait().await.unwrap_err();
    assert!(matches!(err, jsonapi_client::ClientError::ServerError { code: 422, .. }));
    assert_eq!(transport.calls().len(), 2);
}

/// An `errors[]` document deserializes with each entry's status, title,
/// and domain intact.
#[tokio::test]
#[serial]
async fn error_document_deserialization() {
    jsonapi_client::registry::clear_registry();
    register_test_types();

    let body = json!({ "errors": [
        { "status": "404", "title": "Not Found" },
        { "status": "500", "title": "Server Error" }
    ]});
    let deserializer = jsonapi_client::Deserializer::new(Arc::new(jsonapi_client::DasherizingKeyFormatter));
    let doc = deserializer.deserialize(&serde_json::to_vec(&body).unwrap(), Vec::new()).unwrap();

    assert_eq!(doc.errors.len(), 2);
    assert_eq!(doc.errors[0].status, Some(404));
    assert_eq!(doc.errors[0].title.as_deref(), Some("Not Found"));
    assert_eq!(doc.errors[1].status, Some(500));
    for error in &doc.errors {
        assert_eq!(error.domain(), jsonapi_client::ErrorDomain::Server);
    }
}

/// `findOne` over an empty collection fails with `ResourceNotFound`.
#[tokio::test]
#[serial]
async fn find_one_on_empty_collection_is_not_found() {
    jsonapi_client::registry::clear_registry();
    register_test_types();

    let transport = Arc::new(MockTransport::with_responses(vec![json_response(200, json!({ "data": [] }))]));
    let client = ClientBuilder::new("http://example.com", transport).build();

    let err = client.find_one_by_id("foos", "1").wait().await.unwrap_err();
    assert!(matches!(err, jsonapi_client::ClientError::ResourceNotFound));
}

/// `loadNextPageOfCollection` without a `nextURL` fails fast, with no call.
#[tokio::test]
#[serial]
async fn load_next_page_without_next_url_fails() {
    jsonapi_client::registry::clear_registry();
    register_test_types();

    let transport = Arc::new(MockTransport::with_responses(vec![]));
    let client = ClientBuilder::new("http://example.com", transport.clone()).build();

    let mut collection = jsonapi_client::ResourceCollection::new(Vec::new());
    let err = client.load_next_page(&mut collection).await.unwrap_err();
    assert!(matches!(err, jsonapi_client::ClientError::NextPageNotAvailable));
    assert!(transport.calls().is_empty());
}

/// `ensure` no-ops for an already-loaded resource.
#[tokio::test]
#[serial]
async fn ensure_skips_fetch_when_already_loaded() {
    jsonapi_client::registry::clear_registry();
    register_test_types();

    let transport = Arc::new(MockTransport::with_responses(vec![]));
    let client = ClientBuilder::new("http://example.com", transport.clone()).build();

    let foo = Resource::new("foos");
    foo.set_id("1");
    foo.set_loaded(true);

    let ensured = client.ensure(foo.clone(), None::<fn(jsonapi_client::Query) -> jsonapi_client::Query>).wait().await.unwrap();
    assert!(ensured.same_instance(&foo));
    assert!(transport.calls().is_empty());
}

/// `ensure`'s optional query callback customizes the fetch it issues —
/// here, adding an `include` — before the request goes out.
#[tokio::test]
#[serial]
async fn ensure_applies_query_callback_to_customize_fetch() {
    jsonapi_client::registry::clear_registry();
    register_test_types();

    let body = json!({ "data": { "type": "foos", "id": "1", "attributes": { "string-attribute": "hello" } } });
    let transport = Arc::new(MockTransport::with_responses(vec![json_response(200, body)]));
    let client = ClientBuilder::new("http://example.com", transport.clone()).build();

    let foo = Resource::new("foos");
    foo.set_id("1");

    let ensured = client
        .ensure(foo.clone(), Some(|q: jsonapi_client::Query| q.include("toOneAttribute")))
        .wait()
        .await
        .unwrap();

    assert!(ensured.same_instance(&foo));
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "http://example.com/foos/1?include=to-one-attribute");
}
