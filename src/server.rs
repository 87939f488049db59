//! Reference graph API server.
//!
//! Serves `GET /api/graph` over a JSON dataset file using the same query
//! parameters `HttpDataSource` sends, plus the dataset directory as static
//! files. Nodes marked `"private": true` are only returned to requests that
//! carry the configured bearer token; any other token is rejected with 401.

use crate::filter::{self, GraphFilter};
use crate::models::Dataset;
use crate::query::QueryParams;
use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::services::ServeDir;

pub struct ServerState {
    pub dataset_path: PathBuf,
    /// Bearer token that unlocks private nodes. `None` means every request
    /// is anonymous.
    pub token: Option<String>,
}

impl ServerState {
    pub fn new(dataset_path: impl Into<PathBuf>, token: Option<String>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    let static_dir = state
        .dataset_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Router::new()
        .route("/api/graph", get(graph_api))
        .nest_service("/data", ServeDir::new(static_dir))
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: SocketAddr, state: ServerState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, dataset = %state.dataset_path.display(), "graph API listening");
    axum::serve(listener, router(Arc::new(state))).await
}

// ============================================================================
// Handlers
// ============================================================================

enum Access {
    Anonymous,
    Authenticated,
    Denied,
}

fn access(state: &ServerState, headers: &HeaderMap) -> Access {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match (presented, state.token.as_deref()) {
        (None, _) => Access::Anonymous,
        (Some(given), Some(expected)) if given == expected => Access::Authenticated,
        _ => Access::Denied,
    }
}

pub async fn graph_api(
    State(state): State<Arc<ServerState>>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Response {
    let authenticated = match access(&state, &headers) {
        Access::Anonymous => false,
        Access::Authenticated => true,
        Access::Denied => {
            tracing::warn!("rejected request with unknown bearer token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let dataset = match load(&state.dataset_path).await {
        Ok(dataset) => filter::visible_to(&dataset, authenticated),
        Err(message) => {
            tracing::error!(path = %state.dataset_path.display(), %message, "failed to load dataset");
            return (StatusCode::INTERNAL_SERVER_ERROR, message).into_response();
        }
    };

    let params = QueryParams::parse(raw.as_deref().unwrap_or(""));
    if let Some(prefix) = params.get("suggest") {
        return Json(filter::suggest(&dataset, prefix)).into_response();
    }

    let result = filter::apply(&dataset, &GraphFilter::from_params(&params));
    tracing::debug!(?params, nodes = result.nodes.len(), authenticated, "graph query");
    Json(result).into_response()
}

async fn load(path: &Path) -> Result<Dataset, String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::models::QueryField;
    use crate::query::QueryModel;
    use crate::session::SessionGate;
    use crate::source::{DataSource, HttpDataSource};
    use std::io::Write;
    use std::time::Duration;
    use url::Url;

    const SAMPLE: &str = r#"{
        "nodes": [
            {"id": "nile", "group": "river"},
            {"id": "egypt", "group": "country"},
            {"id": "sudan", "group": "country"},
            {"id": "lake_x", "group": "lake", "private": true}
        ],
        "links": [
            {"source": "nile", "target": "egypt", "predicate": "flowsThrough"},
            {"source": "nile", "target": "sudan", "predicate": "flowsThrough"},
            {"source": "lake_x", "target": "sudan", "predicate": "locatedIn"}
        ]
    }"#;

    struct Running {
        source: HttpDataSource,
        _file: tempfile::NamedTempFile,
    }

    async fn start(token: Option<&str>) -> Running {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let state = Arc::new(ServerState::new(file.path(), token.map(str::to_string)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        let base = Url::parse(&format!("http://{}/api/graph", addr)).unwrap();
        Running {
            source: HttpDataSource::new(base, Duration::from_secs(5)).unwrap(),
            _file: file,
        }
    }

    #[tokio::test]
    async fn test_anonymous_search_hides_private_nodes() {
        let server = start(Some("secret")).await;
        let ds = server
            .source
            .search(&QueryParams::new(), &SessionGate::new(None).headers())
            .await
            .unwrap();
        assert_eq!(ds.node_ids(), vec!["nile", "egypt", "sudan"]);
        assert_eq!(ds.links.len(), 2);
    }

    #[tokio::test]
    async fn test_valid_token_unlocks_private_nodes() {
        let server = start(Some("secret")).await;
        let gate = SessionGate::new(Some("secret".to_string()));
        let ds = server
            .source
            .search(&QueryParams::new(), &gate.headers())
            .await
            .unwrap();
        assert!(ds.node("lake_x").is_some());
        assert!(ds.validate().is_ok());
    }

    #[tokio::test]
    async fn test_wrong_token_is_unauthorized() {
        let server = start(Some("secret")).await;
        let gate = SessionGate::new(Some("guess".to_string()));
        let err = server
            .source
            .search(&QueryParams::new(), &gate.headers())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Status { status: 401 }));
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_structured_filter_over_http() {
        let server = start(None).await;
        let mut model = QueryModel::new();
        model.set(QueryField::Object, "egypt");

        let ds = server
            .source
            .search(&model.to_query_params(), &SessionGate::new(None).headers())
            .await
            .unwrap();
        assert_eq!(ds.links.len(), 1);
        assert_eq!(ds.links[0].target, "egypt");
        assert!(ds.node("sudan").is_none());
    }

    #[tokio::test]
    async fn test_suggestions_over_http() {
        let server = start(None).await;
        let list = server
            .source
            .suggest("su", &SessionGate::new(None).headers())
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].value, "sudan");
    }
}
