use crate::catalog::{
    parse_limit, parse_offset, CatalogStore, MonsterEntry, MonsterListResponse, MonsterQuery,
};
use crate::error::ApiError;
use crate::icons::IconResolver;
use axum::{
    extract::{Path, Query},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared request context: the injected catalog capability, the icon
/// resolver, and the base used to derive icon URLs.
#[derive(Clone)]
pub struct AppContext {
    pub catalog: Arc<dyn CatalogStore>,
    pub icons: Arc<IconResolver>,
    pub public_base_url: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::IconNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// Raw listing parameters as they arrive on the query string. `limit`
/// and `offset` stay strings here so malformed values produce this
/// API's validation error instead of a framework rejection.
#[derive(Debug, Default, Deserialize)]
struct ListParams {
    stars: Option<String>,
    elements: Option<String>,
    q: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

async fn list_monsters(
    Extension(ctx): Extension<AppContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<MonsterListResponse>, ApiError> {
    let limit = parse_limit(params.limit.as_deref())?;
    let offset = parse_offset(params.offset.as_deref())?;

    let query = MonsterQuery::new(
        params.stars.as_deref(),
        params.elements.as_deref(),
        params.q.as_deref(),
        limit,
        offset,
    );

    let records = ctx.catalog.list_monsters(&query).await?;

    let results: Vec<MonsterEntry> = records
        .into_iter()
        .map(|record| MonsterEntry::new(record, &ctx.public_base_url))
        .collect();

    info!(
        "Served monster listing: {} clause(s), {} row(s)",
        query.clauses.len(),
        results.len()
    );

    Ok(Json(MonsterListResponse {
        count: results.len(),
        results,
    }))
}

async fn get_icon(
    Extension(ctx): Extension<AppContext>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Only <integer>.png names exist in the icon namespace.
    let id = filename
        .strip_suffix(".png")
        .and_then(|stem| stem.parse::<i64>().ok())
        .ok_or(ApiError::IconNotFound)?;

    let bytes = ctx.icons.resolve(id).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

/// Create the HTTP server with all routes
pub fn create_server(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/monsters", get(list_monsters))
        .route("/icons/:filename", get(get_icon))
        .layer(Extension(ctx))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the configured address
pub async fn start_server(
    ctx: AppContext,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_server(ctx);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| ApiError::Config(format!("Invalid listen address {host}:{port}: {e}")))?;

    info!("HTTP server running on http://{addr}");
    println!("🚀 HTTP server running on http://{addr}");
    println!("💚 Health check: http://{addr}/health");
    println!("📖 Monster list: http://{addr}/api/monsters");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
