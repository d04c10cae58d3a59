//! Request DSL for integration tests.
//!
//! [`ResourceTester`] exercises a RESTful resource (create → 201, read → 200,
//! update → 202, destroy → 204) and [`GraphqlTester`] runs queries and
//! create/update/destroy cycles against a GraphQL endpoint. Both drive an
//! axum [`Router`] in-process with `tower::ServiceExt::oneshot`.
//!
//! ```rust,ignore
//! ResourceTester::new(app, "/api/posts")
//!     .crud(TestOptions::default()
//!         .data(json!({"title": "hello"}))
//!         .patch(json!({"title": "edited"})))
//!     .await;
//! ```
//!
//! A failed check panics, unless the options carry an `error_assert`
//! callback, which then receives the failure message instead.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header, request};
use serde_json::{Value as JsonValue, json};
use tower::ServiceExt;

/// Adjusts an outgoing request (headers, auth).
pub type Middleware = Arc<dyn Fn(request::Builder) -> request::Builder + Send + Sync>;
type AssertFn = Arc<dyn Fn(&TestResponse) + Send + Sync>;
type ErrorAssertFn = Arc<dyn Fn(String) + Send + Sync>;
type DataFn = Arc<dyn Fn() -> Option<JsonValue> + Send + Sync>;

/// A buffered response.
#[derive(Debug, Clone)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// Body parsed as JSON, `Null` when empty or not JSON.
    pub fn json(&self) -> JsonValue {
        serde_json::from_slice(&self.body).unwrap_or(JsonValue::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Per-check options.
#[derive(Clone, Default)]
pub struct TestOptions {
    before: Option<Middleware>,
    data: Option<JsonValue>,
    patch: Option<JsonValue>,
    assert: Option<AssertFn>,
    error_assert: Option<ErrorAssertFn>,
}

impl TestOptions {
    /// Adjust every request of this check.
    pub fn before(
        mut self,
        f: impl Fn(request::Builder) -> request::Builder + Send + Sync + 'static,
    ) -> Self {
        self.before = Some(Arc::new(f));
        self
    }

    /// Body of the POST creating the row under test.
    pub fn data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }

    /// Body of the PATCH; every key is compared against the response.
    pub fn patch(mut self, patch: JsonValue) -> Self {
        self.patch = Some(patch);
        self
    }

    /// Extra assertions on the final response.
    pub fn assert(mut self, f: impl Fn(&TestResponse) + Send + Sync + 'static) -> Self {
        self.assert = Some(Arc::new(f));
        self
    }

    /// Receives failures instead of panicking.
    pub fn error_assert(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.error_assert = Some(Arc::new(f));
        self
    }
}

type Outcome = Result<TestResponse, String>;

/// Send one request through the router and buffer the response.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<&JsonValue>,
    middlewares: &[&Middleware],
) -> Outcome {
    let mut builder = Request::builder().method(method.clone()).uri(uri);
    for middleware in middlewares {
        builder = middleware(builder);
    }

    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let request = builder
        .body(body)
        .map_err(|e| format!("{} {}: invalid request: {}", method, uri, e))?;

    let Ok(response) = app.clone().oneshot(request).await;
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| format!("{} {}: failed to read body: {}", method, uri, e))?;

    tracing::debug!(%method, uri, status = status.as_u16(), "Test request");
    Ok(TestResponse {
        status,
        headers,
        body,
    })
}

fn expect_status(method: &str, uri: &str, res: TestResponse, expected: StatusCode) -> Outcome {
    if res.status == expected {
        Ok(res)
    } else {
        Err(format!(
            "{} {}: expected status {}, got {}: {}",
            method,
            uri,
            expected.as_u16(),
            res.status.as_u16(),
            res.text()
        ))
    }
}

fn finish(outcome: Outcome, options: &TestOptions) -> Option<TestResponse> {
    match outcome {
        Ok(res) => {
            if let Some(assert) = &options.assert {
                assert(&res);
            }
            Some(res)
        }
        Err(message) => match &options.error_assert {
            Some(error_assert) => {
                error_assert(message);
                None
            }
            None => panic!("{}", message),
        },
    }
}

struct Setup {
    data: DataFn,
    middleware: Option<Middleware>,
}

/// RESTful resource checks.
pub struct ResourceTester {
    app: Router,
    resource: String,
    middlewares: Vec<Middleware>,
    setup: Option<Setup>,
}

impl ResourceTester {
    pub fn new(app: Router, resource: impl Into<String>) -> Self {
        Self {
            app,
            resource: resource.into(),
            middlewares: Vec::new(),
            setup: None,
        }
    }

    /// Create the row under test from fixed data for every check.
    pub fn setup(self, data: JsonValue) -> Self {
        self.setup_with(move || Some(data.clone()), None)
    }

    /// Create the row under test from generated data for every check,
    /// optionally adjusting the setup request.
    pub fn setup_with(
        mut self,
        data: impl Fn() -> Option<JsonValue> + Send + Sync + 'static,
        middleware: Option<Middleware>,
    ) -> Self {
        self.setup = Some(Setup {
            data: Arc::new(data),
            middleware,
        });
        self
    }

    /// Middlewares applied to every request; replaces earlier ones.
    pub fn use_middleware(mut self, middlewares: Vec<Middleware>) -> Self {
        self.middlewares = middlewares;
        self
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&JsonValue>,
        before: Option<&Middleware>,
    ) -> Outcome {
        let mut chain: Vec<&Middleware> = before.into_iter().collect();
        chain.extend(self.middlewares.iter());
        send(&self.app, method, uri, body, &chain).await
    }

    /// POST the row under test, from the setup or the options' data.
    async fn origin(&self, options: &TestOptions) -> Outcome {
        let (data, before) = match &self.setup {
            Some(setup) => ((setup.data)(), setup.middleware.as_ref()),
            None => (options.data.clone(), options.before.as_ref()),
        };
        self.request(Method::POST, &self.resource, data.as_ref(), before)
            .await
    }

    async fn origin_id(&self, options: &TestOptions) -> Result<JsonValue, String> {
        let origin = self.origin(options).await?;
        let origin = expect_status("POST", &self.resource, origin, StatusCode::CREATED)?;
        match origin.json().get("id") {
            Some(id) if !id.is_null() => Ok(id.clone()),
            _ => Err(format!("POST {}: response has no id: {}", self.resource, origin.text())),
        }
    }

    fn item_uri(&self, id: &JsonValue) -> String {
        match id {
            JsonValue::String(s) => format!("{}/{}", self.resource, s),
            other => format!("{}/{}", self.resource, other),
        }
    }

    /// `POST resource` answers 201.
    pub async fn create(&self, options: TestOptions) -> Option<TestResponse> {
        let outcome = match self.origin(&options).await {
            Ok(res) => expect_status("POST", &self.resource, res, StatusCode::CREATED),
            Err(e) => Err(e),
        };
        finish(outcome, &options)
    }

    /// `GET resource` answers 200 with an array, and `GET resource/{id}`
    /// answers 200 with the row just created. Returns the second response.
    pub async fn read(&self, options: TestOptions) -> Option<TestResponse> {
        let list = async {
            self.origin_id(&options).await?;
            let res = self
                .request(Method::GET, &self.resource, None, options.before.as_ref())
                .await?;
            let res = expect_status("GET", &self.resource, res, StatusCode::OK)?;
            if res.json().is_array() {
                Ok(res)
            } else {
                Err(format!("GET {}: expected an array, got {}", self.resource, res.text()))
            }
        };
        finish(list.await, &options)?;

        let item = async {
            let id = self.origin_id(&options).await?;
            let uri = self.item_uri(&id);
            let res = self
                .request(Method::GET, &uri, None, options.before.as_ref())
                .await?;
            let res = expect_status("GET", &uri, res, StatusCode::OK)?;
            if res.json().get("id") == Some(&id) {
                Ok(res)
            } else {
                Err(format!("GET {}: expected id {}, got {}", uri, id, res.text()))
            }
        };
        finish(item.await, &options)
    }

    /// `PATCH resource/{id}` answers 202 and echoes every patched key.
    pub async fn update(&self, options: TestOptions) -> Option<TestResponse> {
        let outcome = async {
            let id = self.origin_id(&options).await?;
            let uri = self.item_uri(&id);
            let res = self
                .request(
                    Method::PATCH,
                    &uri,
                    Some(options.patch.as_ref().unwrap_or(&json!({}))),
                    options.before.as_ref(),
                )
                .await?;
            let res = expect_status("PATCH", &uri, res, StatusCode::ACCEPTED)?;

            let body = res.json();
            if let Some(JsonValue::Object(patch)) = &options.patch {
                for (key, expected) in patch {
                    if body.get(key) != Some(expected) {
                        return Err(format!(
                            "PATCH {}: expected {} = {}, got {}",
                            uri,
                            key,
                            expected,
                            body.get(key).unwrap_or(&JsonValue::Null)
                        ));
                    }
                }
            }
            Ok(res)
        };
        finish(outcome.await, &options)
    }

    /// `DELETE resource/{id}` answers 204.
    pub async fn destroy(&self, options: TestOptions) -> Option<TestResponse> {
        let outcome = async {
            let id = self.origin_id(&options).await?;
            let uri = self.item_uri(&id);
            let res = self
                .request(Method::DELETE, &uri, None, options.before.as_ref())
                .await?;
            expect_status("DELETE", &uri, res, StatusCode::NO_CONTENT)
        };
        finish(outcome.await, &options)
    }

    /// create, read, update and destroy with the same options.
    pub async fn crud(&self, options: TestOptions) {
        self.create(options.clone()).await;
        self.read(options.clone()).await;
        self.update(options.clone()).await;
        self.destroy(options).await;
    }
}

/// A GraphQL response split into its parts.
#[derive(Debug, Clone)]
pub struct GraphqlResponse {
    pub status: StatusCode,
    pub data: JsonValue,
    pub errors: Vec<JsonValue>,
}

impl GraphqlResponse {
    /// `extensions.code` of the first error.
    pub fn error_code(&self) -> Option<&str> {
        self.errors
            .first()
            .and_then(|e| e.pointer("/extensions/code"))
            .and_then(JsonValue::as_str)
    }
}

/// Create/update/destroy cycle for one GraphQL type.
#[derive(Debug, Clone)]
pub struct MutationCycle {
    /// Type name, e.g. `Post` for `createPost`
    pub name: String,
    /// Attributes for the create step
    pub create: JsonValue,
    /// Patch for the update step
    pub update: JsonValue,
}

/// GraphQL endpoint checks.
pub struct GraphqlTester {
    app: Router,
    endpoint: String,
    middlewares: Vec<Middleware>,
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl GraphqlTester {
    pub fn new(app: Router, endpoint: impl Into<String>) -> Self {
        Self {
            app,
            endpoint: endpoint.into(),
            middlewares: Vec::new(),
        }
    }

    pub fn use_middleware(mut self, middlewares: Vec<Middleware>) -> Self {
        self.middlewares = middlewares;
        self
    }

    /// POST a query; panics if the transport itself fails.
    pub async fn query(&self, query: &str, variables: Option<JsonValue>) -> GraphqlResponse {
        let body = json!({
            "query": query,
            "variables": variables.unwrap_or_else(|| json!({})),
        });
        let chain: Vec<&Middleware> = self.middlewares.iter().collect();
        let res = match send(&self.app, Method::POST, &self.endpoint, Some(&body), &chain).await {
            Ok(res) => res,
            Err(e) => panic!("{}", e),
        };

        let json = res.json();
        GraphqlResponse {
            status: res.status,
            data: json.get("data").cloned().unwrap_or(JsonValue::Null),
            errors: json
                .get("errors")
                .and_then(JsonValue::as_array)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Query and panic unless it succeeds without errors; returns `data`.
    pub async fn query_ok(&self, query: &str, variables: Option<JsonValue>) -> JsonValue {
        let res = self.query(query, variables).await;
        if res.status != StatusCode::OK || !res.errors.is_empty() {
            panic!(
                "query failed with status {}: {:?}\n{}",
                res.status.as_u16(),
                res.errors,
                query
            );
        }
        res.data
    }

    /// Run `create{name}` and return the created entity.
    pub async fn create(&self, name: &str, attributes: JsonValue) -> JsonValue {
        let fields = Self::selection(&attributes);
        let mutation = format!(
            "mutation Create($attributes: JSON!) {{ create{name}(attributes: $attributes) {{ {fields} }} }}"
        );
        let data = self
            .query_ok(&mutation, Some(json!({ "attributes": attributes })))
            .await;
        let entity = data[format!("create{}", name)].clone();
        assert!(entity["id"].is_number(), "create{} returned no id: {}", name, data);
        entity
    }

    /// create, update (patched keys echoed), destroy (returns true), then
    /// read back by id (null).
    pub async fn mutation(&self, cycle: MutationCycle) {
        let name = &cycle.name;
        let created = self.create(name, cycle.create.clone()).await;
        let id = created["id"].clone();

        let fields = Self::selection(&cycle.update);
        let mutation = format!(
            "mutation Update($id: Int!, $attributes: JSON!) {{ update{name}(id: $id, attributes: $attributes) {{ {fields} }} }}"
        );
        let data = self
            .query_ok(
                &mutation,
                Some(json!({ "id": id, "attributes": cycle.update })),
            )
            .await;
        let updated = &data[format!("update{}", name)];
        if let JsonValue::Object(patch) = &cycle.update {
            for (key, expected) in patch {
                assert_eq!(
                    &updated[camel_case(key)],
                    expected,
                    "update{} did not apply {}",
                    name,
                    key
                );
            }
        }

        let mutation =
            format!("mutation Destroy($id: Int!) {{ destroy{name}(id: $id) }}");
        let data = self
            .query_ok(&mutation, Some(json!({ "id": id })))
            .await;
        assert_eq!(data[format!("destroy{}", name)], json!(true));

        let read = format!(
            "query Read($id: Int!) {{ {field}(id: $id) {{ id }} }}",
            field = lower_first(name)
        );
        let data = self.query_ok(&read, Some(json!({ "id": id }))).await;
        assert!(
            data[lower_first(name)].is_null(),
            "{} {} still readable after destroy",
            name,
            id
        );
    }

    /// `id` plus the camelCased keys of an attribute map.
    fn selection(attributes: &JsonValue) -> String {
        let mut fields = vec!["id".to_string()];
        if let JsonValue::Object(map) = attributes {
            fields.extend(map.keys().map(|k| camel_case(k)).filter(|k| k != "id"));
        }
        fields.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("post_id"), "postId");
        assert_eq!(camel_case("created_at"), "createdAt");
        assert_eq!(camel_case("title"), "title");
        assert_eq!(lower_first("Post"), "post");
    }

    #[test]
    fn test_selection() {
        assert_eq!(
            GraphqlTester::selection(&json!({"post_id": 1, "title": "x"})),
            "id postId title"
        );
    }
}
