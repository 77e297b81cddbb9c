//! Router assembly

use axum::{
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{handlers, middleware, AppState};

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = TimeoutLayer::new(state.config.request_timeout());

    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Post endpoints
        .route(
            "/posts",
            get(handlers::posts::list_posts).post(handlers::posts::create_post),
        )
        .route(
            "/posts/{id}",
            get(handlers::posts::get_post)
                .put(handlers::posts::replace_post)
                .patch(handlers::posts::patch_post)
                .delete(handlers::posts::delete_post),
        )

        // Section endpoints
        .route(
            "/sections",
            get(handlers::sections::list_sections).post(handlers::sections::create_section),
        )
        .route(
            "/sections/{id}",
            get(handlers::sections::get_section).put(handlers::sections::rename_section),
        )

        // Tag endpoints
        .route("/tags", get(handlers::tags::list_tags));

    // Compose the app
    Router::new()
        .nest("/v1", api_routes)
        .layer(from_fn(middleware::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(timeout)
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use quire_common::{
        config::AppConfig,
        db::{schema, DbPool},
        tags::{list_tags_with_post_count, OrphanSweeper},
    };
    use sea_orm::{ConnectOptions, Database};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_state(with_sweeper: bool) -> (AppState, Option<tokio::task::JoinHandle<()>>) {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let conn = Database::connect(opts).await.unwrap();
        schema::create_all(&conn).await.unwrap();
        let db = DbPool::from_connection(conn);

        let (sweeper, handle) = if with_sweeper {
            let (sweeper, handle) = OrphanSweeper::spawn(db.clone());
            (Some(sweeper), Some(handle))
        } else {
            (None, None)
        };

        let state = AppState {
            config: Arc::new(AppConfig::default()),
            db,
            sweeper,
        };
        (state, handle)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn seed_section(app: &Router, name: &str) -> i64 {
        let (status, body) = call(app, "POST", "/v1/sections", Some(json!({ "name": name }))).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    fn tag_names(post: &Value) -> Vec<String> {
        post["tags"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = test_state(false).await;
        let app = create_router(state);

        let (status, body) = call(&app, "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "alive");

        let (status, body) = call(&app, "GET", "/v1/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["database"]["reachable"], true);
        assert_eq!(body["orphan_sweeper"], "disabled");
    }

    #[tokio::test]
    async fn test_create_and_fetch_post() {
        let (state, _) = test_state(false).await;
        let app = create_router(state);
        let section_id = seed_section(&app, "general").await;

        let (status, created) = call(
            &app,
            "POST",
            "/v1/posts",
            Some(json!({
                "title": "Hello world",
                "body": "first!",
                "section_id": section_id,
                "tags": ["intro", "hello", "intro"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        assert_eq!(tag_names(&created), vec!["hello", "intro"]);
        assert_eq!(created["section"]["name"], "general");
        assert!(created["updated_at"].is_null());

        let uri = format!("/v1/posts/{}", created["id"]);
        let (status, fetched) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_404() {
        let (state, _) = test_state(false).await;
        let app = create_router(state);

        let (status, body) = call(&app, "GET", "/v1/posts/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "POST_NOT_FOUND");

        let (status, _) = call(&app, "DELETE", "/v1/posts/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, "PATCH", "/v1/posts/99", Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &app,
            "POST",
            "/v1/posts",
            Some(json!({ "title": "No section", "body": "", "section_id": 12 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "SECTION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_validation_errors_are_400() {
        let (state, _) = test_state(false).await;
        let app = create_router(state);
        let section_id = seed_section(&app, "general").await;

        let (status, body) = call(
            &app,
            "POST",
            "/v1/posts",
            Some(json!({ "title": "short", "body": "", "section_id": section_id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["field"], "title");

        let (status, _) = call(
            &app,
            "POST",
            "/v1/posts",
            Some(json!({ "title": "Long enough", "body": "", "section_id": section_id, "tags": ["abc"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, "POST", "/v1/posts", Some(json!({ "title": 5 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");

        let (status, _) = call(&app, "POST", "/v1/sections", Some(json!({ "name": "abc" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_patch_and_put_semantics() {
        let (state, _) = test_state(false).await;
        let app = create_router(state);
        let section_id = seed_section(&app, "general").await;
        let (_, created) = call(
            &app,
            "POST",
            "/v1/posts",
            Some(json!({
                "title": "Original title",
                "body": "original",
                "section_id": section_id,
                "tags": ["first", "second"]
            })),
        )
        .await;
        let uri = format!("/v1/posts/{}", created["id"]);

        let (status, patched) = call(
            &app,
            "PATCH",
            &uri,
            Some(json!({ "title": null, "body": "patched" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{patched}");
        assert_eq!(patched["title"], "Original title");
        assert_eq!(patched["body"], "patched");
        assert_eq!(tag_names(&patched), vec!["first", "second"]);
        assert!(!patched["updated_at"].is_null());

        let (status, replaced) = call(
            &app,
            "PUT",
            &uri,
            Some(json!({ "title": "Replaced title", "body": "", "section_id": section_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{replaced}");
        assert!(tag_names(&replaced).is_empty());
        assert_eq!(replaced["created_at"], created["created_at"]);

        let (status, _) = call(&app, "PUT", &uri, Some(json!({ "title": "Missing fields" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (state, _) = test_state(false).await;
        let app = create_router(state);
        let news = seed_section(&app, "news1").await;
        let blog = seed_section(&app, "blogs").await;

        for (title, section, tags) in [
            ("Rust release notes", news, vec!["rustlang", "release"]),
            ("Rust meetup recap", blog, vec!["rustlang"]),
            ("Gardening in spring", blog, vec!["release"]),
        ] {
            let (status, _) = call(
                &app,
                "POST",
                "/v1/posts",
                Some(json!({ "title": title, "body": "", "section_id": section, "tags": tags })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, all) = call(&app, "GET", "/v1/posts", None).await;
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, both) = call(&app, "GET", "/v1/posts?tags=rustlang,release", None).await;
        let both = both.as_array().unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0]["title"], "Rust release notes");

        let (status, repeated) = call(&app, "GET", "/v1/posts?tags=rustlang&tags=release", None).await;
        assert_eq!(status, StatusCode::OK, "{repeated}");
        assert_eq!(repeated.as_array().unwrap(), both);

        let uri = format!("/v1/posts?title=RUST&section_id={}", blog);
        let (_, by_title) = call(&app, "GET", &uri, None).await;
        let by_title = by_title.as_array().unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0]["title"], "Rust meetup recap");

        let (_, future) = call(&app, "GET", "/v1/posts?created_at_gt=2999-01-01T00:00:00Z", None).await;
        assert!(future.as_array().unwrap().is_empty());

        let (status, body) = call(&app, "GET", "/v1/posts?created_at_lt=yesterday", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");
    }

    #[tokio::test]
    async fn test_non_numeric_ids_get_json_errors() {
        let (state, _) = test_state(false).await;
        let app = create_router(state);

        for (method, uri) in [
            ("GET", "/v1/posts/abc"),
            ("DELETE", "/v1/posts/abc"),
            ("GET", "/v1/sections/first"),
        ] {
            let (status, body) = call(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(body["error"]["code"], "INVALID_FORMAT", "{method} {uri}");
        }

        let (status, body) = call(&app, "PATCH", "/v1/posts/1.5", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");
    }

    #[tokio::test]
    async fn test_sections_crud() {
        let (state, _) = test_state(false).await;
        let app = create_router(state);
        let id = seed_section(&app, "general").await;

        let (status, body) = call(&app, "POST", "/v1/sections", Some(json!({ "name": "general" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let uri = format!("/v1/sections/{}", id);
        let (status, renamed) = call(&app, "PUT", &uri, Some(json!({ "name": "updates" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["name"], "updates");

        let (_, listed) = call(&app, "GET", "/v1/sections", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = call(&app, "GET", "/v1/sections/77", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_schedules_orphan_sweep() {
        let (state, handle) = test_state(true).await;
        let db = state.db.clone();
        let app = create_router(state);
        let section_id = seed_section(&app, "general").await;

        call(
            &app,
            "POST",
            "/v1/posts",
            Some(json!({ "title": "Keeps shared", "body": "", "section_id": section_id, "tags": ["shared"] })),
        )
        .await;
        let (_, doomed) = call(
            &app,
            "POST",
            "/v1/posts",
            Some(json!({ "title": "Gets deleted", "body": "", "section_id": section_id, "tags": ["shared", "only-mine"] })),
        )
        .await;

        let (status, counts) = call(&app, "GET", "/v1/tags", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(counts, json!([
            { "id": 2, "name": "only-mine", "post_count": 1 },
            { "id": 1, "name": "shared", "post_count": 2 }
        ]));

        let uri = format!("/v1/posts/{}", doomed["id"]);
        let (status, body) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());

        // last sender gone: the worker drains the pending sweep and exits
        drop(app);
        handle.unwrap().await.unwrap();

        let remaining = list_tags_with_post_count(db.read()).await.unwrap();
        let names: Vec<_> = remaining.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["shared"]);
    }
}
