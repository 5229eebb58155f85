//! In-process HTTP file store speaking the block/file/token protocol.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use stash_core::BlockDigest;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const SERVICE_KEY: &str = "test-sk";

#[derive(Clone, Debug)]
pub struct FileRecord {
    pub name: String,
    pub size: u64,
    pub blocks: Vec<String>,
    pub json_text: String,
}

#[derive(Default)]
pub struct StoreState {
    pub tokens: HashMap<String, String>,
    pub blocks: HashMap<String, Bytes>,
    pub files: HashMap<String, FileRecord>,
    pub exists_calls: usize,
    pub block_uploads: usize,
    pub commits: usize,
    next_id: u64,
}

/// A running fake store.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct FakeStore {
    pub base_url: String,
    pub state: Arc<Mutex<StoreState>>,
    handle: tokio::task::JoinHandle<()>,
}

#[allow(dead_code)]
impl FakeStore {
    /// Start the store on an ephemeral localhost port.
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(StoreState::default()));
        let router = Router::new()
            .route("/file/block", get(block_exists).post(upload_block))
            .route(
                "/file/info",
                get(file_info).post(commit_file).delete(delete_file),
            )
            .route("/file/download", get(download_file))
            .route("/token", post(grant_token).delete(revoke_token))
            .layer(DefaultBodyLimit::disable())
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake store");
        let addr = listener.local_addr().expect("Failed to read local address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("fake store crashed");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    pub fn exists_calls(&self) -> usize {
        self.state.lock().unwrap().exists_calls
    }

    pub fn block_uploads(&self) -> usize {
        self.state.lock().unwrap().block_uploads
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn file(&self, id: &str) -> Option<FileRecord> {
        self.state.lock().unwrap().files.get(id).cloned()
    }
}

impl Drop for FakeStore {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

type Shared = State<Arc<Mutex<StoreState>>>;

fn authorized(state: &StoreState, token: Option<&String>) -> bool {
    token.is_some_and(|t| state.tokens.contains_key(t))
}

async fn read_form(mut multipart: Multipart) -> Result<HashMap<String, Bytes>, StatusCode> {
    let mut fields = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        fields.insert(name, data);
    }
    Ok(fields)
}

fn text(fields: &HashMap<String, Bytes>, key: &str) -> String {
    fields
        .get(key)
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .unwrap_or_default()
}

async fn block_exists(State(state): Shared, Query(q): Query<HashMap<String, String>>) -> StatusCode {
    let mut state = state.lock().unwrap();
    if !authorized(&state, q.get("token")) {
        return StatusCode::UNAUTHORIZED;
    }
    state.exists_calls += 1;
    match q.get("sha256") {
        Some(hash) if state.blocks.contains_key(hash) => StatusCode::OK,
        _ => StatusCode::NOT_FOUND,
    }
}

async fn upload_block(State(state): Shared, multipart: Multipart) -> StatusCode {
    let fields = match read_form(multipart).await {
        Ok(fields) => fields,
        Err(status) => return status,
    };
    let mut state = state.lock().unwrap();
    if !authorized(&state, Some(&text(&fields, "token"))) {
        return StatusCode::UNAUTHORIZED;
    }
    let hash = text(&fields, "sha256");
    let Some(data) = fields.get("file") else {
        return StatusCode::BAD_REQUEST;
    };
    if BlockDigest::compute(data).to_hex() != hash {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    state.block_uploads += 1;
    state.blocks.insert(hash, data.clone());
    StatusCode::OK
}

async fn commit_file(State(state): Shared, multipart: Multipart) -> Response {
    let fields = match read_form(multipart).await {
        Ok(fields) => fields,
        Err(status) => return status.into_response(),
    };
    let mut state = state.lock().unwrap();
    if !authorized(&state, Some(&text(&fields, "token"))) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.commits += 1;

    let block_text = text(&fields, "block_array_text");
    let blocks: Vec<String> = if block_text.is_empty() {
        Vec::new()
    } else {
        block_text.split(',').map(str::to_string).collect()
    };
    if blocks.iter().any(|b| !state.blocks.contains_key(b)) {
        return (StatusCode::BAD_REQUEST, "unknown block").into_response();
    }
    let Ok(size) = text(&fields, "size").parse::<u64>() else {
        return (StatusCode::BAD_REQUEST, "bad size").into_response();
    };
    let stored: u64 = blocks.iter().map(|b| state.blocks[b].len() as u64).sum();
    if stored != size {
        return (StatusCode::BAD_REQUEST, "size mismatch").into_response();
    }

    state.next_id += 1;
    let id = format!("file-{:08}", state.next_id);
    state.files.insert(
        id.clone(),
        FileRecord {
            name: text(&fields, "name"),
            size,
            blocks,
            json_text: text(&fields, "json_text"),
        },
    );
    (StatusCode::OK, id).into_response()
}

async fn file_info(State(state): Shared, Query(q): Query<HashMap<String, String>>) -> Response {
    let state = state.lock().unwrap();
    if !authorized(&state, q.get("token")) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Some(file) = q.get("id").and_then(|id| state.files.get(id)) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let body = serde_json::json!({
        "name": file.name,
        "size": file.size,
        "block_count": file.blocks.len(),
        "json_text": file.json_text,
    });
    (StatusCode::OK, body.to_string()).into_response()
}

async fn download_file(State(state): Shared, Query(q): Query<HashMap<String, String>>) -> Response {
    let state = state.lock().unwrap();
    if !authorized(&state, q.get("token")) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Some(file) = q.get("id").and_then(|id| state.files.get(id)) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut body = Vec::with_capacity(file.size as usize);
    for hash in &file.blocks {
        body.extend_from_slice(&state.blocks[hash]);
    }
    let mut headers = HeaderMap::new();
    let escaped = utf8_percent_encode(&file.name, NON_ALPHANUMERIC).to_string();
    if let Ok(value) = HeaderValue::from_str(&escaped) {
        headers.insert("x-name", value);
    }
    (StatusCode::OK, headers, body).into_response()
}

async fn delete_file(State(state): Shared, Query(q): Query<HashMap<String, String>>) -> StatusCode {
    let mut state = state.lock().unwrap();
    if !authorized(&state, q.get("token")) {
        return StatusCode::UNAUTHORIZED;
    }
    match q.get("id").and_then(|id| state.files.remove(id)) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn grant_token(State(state): Shared, multipart: Multipart) -> StatusCode {
    let fields = match read_form(multipart).await {
        Ok(fields) => fields,
        Err(status) => return status,
    };
    if text(&fields, "sk") != SERVICE_KEY {
        return StatusCode::FORBIDDEN;
    }
    let mut state = state.lock().unwrap();
    state
        .tokens
        .insert(text(&fields, "token"), text(&fields, "id"));
    StatusCode::OK
}

async fn revoke_token(State(state): Shared, multipart: Multipart) -> StatusCode {
    let fields = match read_form(multipart).await {
        Ok(fields) => fields,
        Err(status) => return status,
    };
    if text(&fields, "sk") != SERVICE_KEY {
        return StatusCode::FORBIDDEN;
    }
    state.lock().unwrap().tokens.remove(&text(&fields, "token"));
    StatusCode::OK
}
