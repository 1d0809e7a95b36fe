use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use vellum::manifest::{NotFoundEntry, SERVER_DIR, STATIC_DIR};
use vellum::router::{RouteNode, RouteType, Router, ScannedLayout};
use vellum::{
    ApiResponse, CacheConfig, DevOptions, DevResolver, LoadOutcome, ManifestError,
    ManifestRouteEntry, MiddlewareOutcome, ModuleRegistry, NativeModule, RouteManifest, Server,
    ServerOptions, Template, TemplateAdapter,
};

// ============================================================================
// Fixtures
// ============================================================================

fn entry(id: &str, route_type: RouteType, server_entry: &str) -> ManifestRouteEntry {
    let mut entry = ManifestRouteEntry::from_route(&RouteNode::new(id, route_type, "unused"));
    entry.server_entry = Some(server_entry.to_string());
    entry
}

fn page(body: &str) -> NativeModule {
    NativeModule::new().with_component(Template::new(body).into_component())
}

struct Fixture {
    out: TempDir,
    manifest: RouteManifest,
    registry: ModuleRegistry,
}

impl Fixture {
    fn new() -> Self {
        Self {
            out: tempfile::tempdir().unwrap(),
            manifest: RouteManifest::new("template", "/"),
            registry: ModuleRegistry::new(),
        }
    }

    /// Registers `module` at `<out>/server/<server_entry>`
    fn module(&mut self, server_entry: &str, module: NativeModule) {
        let path = self.out.path().join(SERVER_DIR).join(server_entry);
        self.registry.register(path, module);
    }

    fn route(&mut self, entry: ManifestRouteEntry, module: NativeModule) {
        if let Some(server_entry) = entry.server_entry.clone() {
            self.module(&server_entry, module);
        }
        self.manifest.insert(entry);
    }

    fn static_file(&self, rel: &str, content: &str) {
        let path = self.out.path().join(STATIC_DIR).join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn server(self) -> (TempDir, axum::Router) {
        self.manifest.save(self.out.path()).unwrap();
        let server = Server::new(ServerOptions {
            out_dir: self.out.path().to_path_buf(),
            adapter: Arc::new(TemplateAdapter::default()),
            runtime: Arc::new(self.registry),
        })
        .unwrap();
        let app = server.router();
        (self.out, app)
    }
}

async fn send(app: &axum::Router, method: &str, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn header_value<'a>(response: &'a Response, name: header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

// ============================================================================
// Startup
// ============================================================================

#[test]
fn test_missing_manifest_is_fatal() {
    let out = tempfile::tempdir().unwrap();
    let result = Server::new(ServerOptions {
        out_dir: out.path().to_path_buf(),
        adapter: Arc::new(TemplateAdapter::default()),
        runtime: Arc::new(ModuleRegistry::new()),
    });

    let err = result.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<ManifestError>(),
        Some(ManifestError::Missing { .. })
    ));
}

#[test]
fn test_manifest_version_mismatch_is_fatal() {
    let out = tempfile::tempdir().unwrap();
    fs::write(
        out.path().join("manifest.json"),
        r#"{"version": 99, "adapter": "template", "base": "/", "routes": {}}"#,
    )
    .unwrap();

    let result = Server::new(ServerOptions {
        out_dir: out.path().to_path_buf(),
        adapter: Arc::new(TemplateAdapter::default()),
        runtime: Arc::new(ModuleRegistry::new()),
    });

    let err = result.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<ManifestError>(),
        Some(ManifestError::VersionMismatch { found: 99, expected: 1 })
    ));
}

// ============================================================================
// Pages
// ============================================================================

#[tokio::test]
async fn test_cache_control_from_cache_export() {
    let mut fixture = Fixture::new();
    let cache = CacheConfig::new()
        .max_age(3600)
        .s_max_age(7200)
        .stale_while_revalidate(300);
    let mut cached = entry("/cached", RouteType::Page, "cached.js");
    cached.cache = Some(cache);
    fixture.route(cached, page("<p>cached</p>").with_cache(cache));
    fixture.route(entry("/plain", RouteType::Page, "plain.js"), page("<p>plain</p>"));
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/cached").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_value(&response, header::CACHE_CONTROL),
        Some("public, max-age=3600, s-maxage=7200, stale-while-revalidate=300")
    );

    let response = send(&app, "GET", "/plain").await;
    assert_eq!(header_value(&response, header::CACHE_CONTROL), Some("no-cache"));
}

#[tokio::test]
async fn test_page_renders_load_data_in_layouts() {
    let mut fixture = Fixture::new();
    let mut post = entry("/posts/[slug]", RouteType::Page, "posts.js");
    post.layout_entries = vec!["layout.js".to_string()];
    post.client_entry = Some("entries/posts-1a2b.js".to_string());
    fixture.route(
        post,
        page("<h1>{title}</h1><p>{params.slug}</p>").with_load(|ctx| async move {
            let slug = ctx.param("slug").unwrap_or_default().to_uppercase();
            Ok(LoadOutcome::data(json!({ "title": slug })))
        }),
    );
    fixture.module("layout.js", page("<main>{slots.content}</main>"));
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/posts/hello").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<main><h1>HELLO</h1><p>hello</p></main>"));
    assert!(html.contains(r#"{"title":"HELLO"}"#));
    assert!(html.contains(r#"<script type="module" src="/entries/posts-1a2b.js"></script>"#));
}

#[tokio::test]
async fn test_load_redirect() {
    let mut fixture = Fixture::new();
    fixture.route(
        entry("/old", RouteType::Page, "old.js"),
        page("<p>old</p>").with_load(|_ctx| async { Ok(LoadOutcome::redirect("/new")) }),
    );
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/old").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(header_value(&response, header::LOCATION), Some("/new"));
}

#[tokio::test]
async fn test_page_without_default_export_is_500() {
    let mut fixture = Fixture::new();
    fixture.route(entry("/broken", RouteType::Page, "broken.js"), NativeModule::new());
    let mut orphan = entry("/orphan", RouteType::Page, "orphan.js");
    orphan.server_entry = None;
    fixture.route(orphan, NativeModule::new());
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/broken").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Internal Server Error");

    let response = send(&app, "GET", "/orphan").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_load_error_is_500() {
    let mut fixture = Fixture::new();
    fixture.route(
        entry("/fails", RouteType::Page, "fails.js"),
        page("<p/>").with_load(|_ctx| async { Err(anyhow::anyhow!("database down")) }),
    );
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/fails").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// ============================================================================
// Prerendered pages
// ============================================================================

#[tokio::test]
async fn test_serves_prerendered_file() {
    let mut fixture = Fixture::new();
    let mut about = entry("/about", RouteType::Page, "about.js");
    about.prerendered = true;
    about.prerendered_file = Some("about/index.html".to_string());
    fixture.route(about, page("<p>rendered at request time</p>"));
    fixture.static_file("about/index.html", "<p>prerendered about</p>");
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/about/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<p>prerendered about</p>");
}

#[tokio::test]
async fn test_slug_outside_prerendered_set_is_404() {
    let mut fixture = Fixture::new();
    let mut posts = entry("/posts/[slug]", RouteType::Page, "posts.js");
    posts.prerendered = true;
    posts.prerendered_count = Some(3);
    fixture.route(posts, page("<p>{params.slug}</p>"));
    for slug in ["a", "b", "c"] {
        fixture.static_file(&format!("posts/{}/index.html", slug), &format!("post {}", slug));
    }
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/posts/b").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "post b");

    let response = send(&app, "GET", "/posts/zzz").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// API routes
// ============================================================================

#[tokio::test]
async fn test_api_method_dispatch() {
    let mut fixture = Fixture::new();
    fixture.route(
        entry("/api/items", RouteType::Api, "items.js"),
        NativeModule::new().with_handler("GET", |_ctx| async {
            Ok(ApiResponse::new().json(&json!(["a", "b"])))
        }),
    );
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/api/items").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"["a","b"]"#);

    let response = send(&app, "PUT", "/api/items").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(header_value(&response, header::ALLOW), Some("GET"));
}

#[tokio::test]
async fn test_allow_header_lists_methods_in_canonical_order() {
    let mut fixture = Fixture::new();
    fixture.route(
        entry("/api/things/[id]", RouteType::Api, "things.js"),
        NativeModule::new()
            .with_handler("DELETE", |_ctx| async { Ok(ApiResponse::new()) })
            .with_handler("GET", |ctx| async move {
                Ok(ApiResponse::new().text(ctx.param("id").unwrap_or_default().to_string()))
            }),
    );
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/api/things/42").await;
    assert_eq!(body_text(response).await, "42");

    let response = send(&app, "POST", "/api/things/42").await;
    assert_eq!(header_value(&response, header::ALLOW), Some("GET, DELETE"));
}

#[tokio::test]
async fn test_api_without_handlers_is_500() {
    let mut fixture = Fixture::new();
    fixture.route(entry("/api/empty", RouteType::Api, "empty.js"), NativeModule::new());
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/api/empty").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// ============================================================================
// Middleware
// ============================================================================

#[tokio::test]
async fn test_middleware_runs_root_first_and_may_respond() {
    let mut fixture = Fixture::new();
    let mut admin = entry("/admin", RouteType::Page, "admin.js");
    admin.middleware = vec!["root-mw.js".to_string(), "admin-mw.js".to_string()];
    fixture.route(admin, page("<p>{user}</p>").with_load(|ctx| async move {
        Ok(LoadOutcome::data(json!({ "user": ctx.local("user").cloned() })))
    }));
    fixture.module(
        "root-mw.js",
        NativeModule::new().with_middleware(|ctx| {
            ctx.set_response_header("x-root", "1");
            if let Some(user) = ctx.get_cookie("user").cloned() {
                ctx.set_local("user", json!(user));
            }
            Ok(MiddlewareOutcome::Continue)
        }),
    );
    fixture.module(
        "admin-mw.js",
        NativeModule::new().with_middleware(|ctx| {
            if ctx.local("user").is_none() {
                return Ok(MiddlewareOutcome::Respond(
                    ApiResponse::new().status(StatusCode::UNAUTHORIZED).text("login required"),
                ));
            }
            Ok(MiddlewareOutcome::Continue)
        }),
    );
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/admin").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header_value(&response, "x-root".parse().unwrap()), Some("1"));

    let request = Request::builder()
        .uri("/admin")
        .header(header::COOKIE, "user=ada")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<p>ada</p>"));
}

// ============================================================================
// Not found
// ============================================================================

#[tokio::test]
async fn test_unmatched_path_is_404() {
    let mut fixture = Fixture::new();
    fixture.route(entry("/", RouteType::Page, "index.js"), page("<p>home</p>"));
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_not_found_page_is_rendered() {
    let mut fixture = Fixture::new();
    fixture.manifest.not_found = Some(NotFoundEntry {
        server_entry: "404.js".to_string(),
        layout_entries: Vec::new(),
    });
    fixture.module("404.js", page("<h1>Nothing at {url}</h1>"));
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("<h1>Nothing at /missing</h1>"));
}

// ============================================================================
// Client assets
// ============================================================================

#[tokio::test]
async fn test_client_assets_are_served() {
    let mut fixture = Fixture::new();
    fixture.route(entry("/", RouteType::Page, "index.js"), page("<p>home</p>"));
    let client = fixture.out.path().join("client/entries");
    fs::create_dir_all(&client).unwrap();
    fs::write(client.join("index-abcd.js"), "console.log(1)").unwrap();
    let (_out, app) = fixture.server();

    let response = send(&app, "GET", "/entries/index-abcd.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "console.log(1)");

    let response = send(&app, "GET", "/").await;
    assert!(body_text(response).await.contains("<p>home</p>"));
}

// ============================================================================
// Dev
// ============================================================================

#[tokio::test]
async fn test_dev_server_imports_source_files() {
    let root = Path::new("/project/src/routes");
    let blog = ScannedLayout::new("/blog", root.join("blog/layout.html"));
    let router = Router::from_parts(
        vec![RouteNode::new("/blog/[slug]", RouteType::Page, root.join("blog/[slug]/page.html"))
            .with_layout("/blog")],
        vec![blog],
        None,
    )
    .unwrap();

    let registry = ModuleRegistry::new()
        .with_module(root.join("blog/[slug]/page.html"), page("<p>{params.slug}</p>"))
        .with_module(root.join("blog/layout.html"), page("<article>{slots.content}</article>"));

    let server = Server::dev(DevOptions {
        resolver: DevResolver::new(router),
        adapter: Arc::new(TemplateAdapter::default()),
        runtime: Arc::new(registry),
        base: "/".to_string(),
    });
    let app = server.router();

    let response = send(&app, "GET", "/blog/first").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<article><p>first</p></article>"));
}
