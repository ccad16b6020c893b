//! In-process stubs and mocks shared by unit tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};

use crate::convert::{Converter, Profile};
use crate::error::{PipelineError, StorageError};
use crate::storage::{ObjectMetadata, ObjectStore};
use crate::types::ObjectLocation;

/// Bind `router` to an ephemeral localhost port and return its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// One request as seen by a [`ScriptedUpstream`].
#[derive(Debug, Clone)]
pub(crate) struct SeenRequest {
    pub method: String,
    pub tag: Option<String>,
    pub body: Vec<u8>,
}

/// Upstream that answers the n-th request with the n-th scripted status
/// (200 once the script runs out) and a body of `attempt <n>`.
#[derive(Clone)]
pub(crate) struct ScriptedUpstream {
    statuses: Arc<Vec<u16>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl ScriptedUpstream {
    pub fn new(statuses: &[u16]) -> Self {
        Self {
            statuses: Arc::new(statuses.to_vec()),
            seen: Arc::default(),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/{*path}", any(scripted))
            .with_state(self.clone())
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

async fn scripted(
    State(upstream): State<ScriptedUpstream>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let mut seen = upstream.seen.lock().unwrap();
    seen.push(SeenRequest {
        method: method.to_string(),
        tag: headers
            .get("x-request-tag")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: body.to_vec(),
    });
    let attempt = seen.len();
    let code = upstream.statuses.get(attempt - 1).copied().unwrap_or(200);
    (
        StatusCode::from_u16(code).unwrap(),
        format!("attempt {attempt}"),
    )
}

#[derive(Default)]
struct StubGcsState {
    objects: HashMap<(String, String), (Vec<u8>, Option<String>)>,
    authorizations: Vec<Option<String>>,
    failing_uploads: Vec<u16>,
    upload_attempts: usize,
}

/// Minimal Cloud Storage JSON API backed by an in-memory map.
#[derive(Clone, Default)]
pub(crate) struct StubGcs {
    state: Arc<Mutex<StubGcsState>>,
}

impl StubGcs {
    pub fn router(&self) -> Router {
        Router::new()
            .route("/storage/v1/b/{bucket}/o/{object}", get(stub_get_object))
            .route("/media/{bucket}/{object}", get(stub_download))
            .route("/upload/storage/v1/b/{bucket}/o", post(stub_insert))
            .with_state(self.clone())
    }

    pub fn put(&self, bucket: &str, name: &str, bytes: &[u8]) {
        self.state.lock().unwrap().objects.insert(
            (bucket.to_string(), name.to_string()),
            (bytes.to_vec(), None),
        );
    }

    pub fn get(&self, bucket: &str, name: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(bucket.to_string(), name.to_string()))
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn content_type(&self, bucket: &str, name: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(bucket.to_string(), name.to_string()))
            .and_then(|(_, content_type)| content_type.clone())
    }

    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().authorizations.clone()
    }

    /// Answer the next `count` uploads with `status` before accepting.
    pub fn fail_next_uploads(&self, count: usize, status: u16) {
        self.state.lock().unwrap().failing_uploads = vec![status; count];
    }

    pub fn upload_attempts(&self) -> usize {
        self.state.lock().unwrap().upload_attempts
    }

    fn record_auth(&self, headers: &HeaderMap) {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        self.state.lock().unwrap().authorizations.push(auth);
    }
}

fn object_json(bucket: &str, name: &str, bytes: &[u8], media_link: &str) -> serde_json::Value {
    serde_json::json!({
        "kind": "storage#object",
        "bucket": bucket,
        "name": name,
        "mediaLink": media_link,
        "size": bytes.len().to_string(),
    })
}

async fn stub_get_object(
    State(stub): State<StubGcs>,
    Path((bucket, object)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    stub.record_auth(&headers);
    let Some(bytes) = stub.get(&bucket, &object) else {
        return (StatusCode::NOT_FOUND, "No such object").into_response();
    };
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let mut media_link = reqwest::Url::parse(&format!("http://{host}/media")).unwrap();
    media_link
        .path_segments_mut()
        .unwrap()
        .push(&bucket)
        .push(&object);
    Json(object_json(&bucket, &object, &bytes, media_link.as_str())).into_response()
}

async fn stub_download(
    State(stub): State<StubGcs>,
    Path((bucket, object)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    stub.record_auth(&headers);
    match stub.get(&bucket, &object) {
        Some(bytes) => bytes.into_response(),
        None => (StatusCode::NOT_FOUND, "No such object").into_response(),
    }
}

async fn stub_insert(
    State(stub): State<StubGcs>,
    Path(bucket): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    stub.record_auth(&headers);
    {
        let mut state = stub.state.lock().unwrap();
        state.upload_attempts += 1;
        if !state.failing_uploads.is_empty() {
            let status = state.failing_uploads.remove(0);
            return (StatusCode::from_u16(status).unwrap(), "try again").into_response();
        }
    }
    let Some(name) = params.get("name").cloned() else {
        return (StatusCode::BAD_REQUEST, "missing name").into_response();
    };
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    stub.state.lock().unwrap().objects.insert(
        (bucket.clone(), name.clone()),
        (body.to_vec(), content_type),
    );
    Json(object_json(&bucket, &name, &body, "")).into_response()
}

/// In-memory [`ObjectStore`] with switchable failures.
#[derive(Default)]
pub(crate) struct MemoryStore {
    objects: Mutex<HashMap<ObjectLocation, Vec<u8>>>,
    uploads: Mutex<Vec<(ObjectLocation, Vec<u8>, String)>>,
    failing_gets: Mutex<Vec<ObjectLocation>>,
    fail_uploads: AtomicBool,
    panic_on_get: AtomicBool,
}

impl MemoryStore {
    pub fn with_object(self, bucket: &str, name: &str, bytes: &[u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(ObjectLocation::new(bucket, name), bytes.to_vec());
        self
    }

    /// Make `get_object` fail for this location.
    pub fn fail_get(&self, bucket: &str, name: &str) {
        self.failing_gets
            .lock()
            .unwrap()
            .push(ObjectLocation::new(bucket, name));
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn panic_on_get(&self, enabled: bool) {
        self.panic_on_get.store(enabled, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> Vec<(ObjectLocation, Vec<u8>, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, location: &ObjectLocation) -> Result<ObjectMetadata, StorageError> {
        if self.panic_on_get.load(Ordering::SeqCst) {
            panic!("storage client bug");
        }
        let not_found = || StorageError::Status {
            status: 404,
            url: location.to_string(),
            body: "No such object".into(),
        };
        if self.failing_gets.lock().unwrap().contains(location) {
            return Err(not_found());
        }
        let objects = self.objects.lock().unwrap();
        let bytes = objects.get(location).ok_or_else(not_found)?;
        Ok(ObjectMetadata {
            name: location.name.clone(),
            bucket: location.bucket.clone(),
            media_link: format!("mem://{location}"),
            self_link: None,
            size: Some(bytes.len().to_string()),
            content_type: None,
        })
    }

    async fn download(&self, media_link: &str) -> Result<Vec<u8>, StorageError> {
        let path = media_link.trim_start_matches("mem://");
        let location = ObjectLocation::parse(path).map_err(|e| StorageError::Url(e.to_string()))?;
        self.objects
            .lock()
            .unwrap()
            .get(&location)
            .cloned()
            .ok_or_else(|| StorageError::Url(media_link.to_string()))
    }

    async fn insert(
        &self,
        location: &ObjectLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectMetadata, StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Status {
                status: 503,
                url: location.to_string(),
                body: "unavailable".into(),
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((location.clone(), bytes.clone(), content_type.to_string()));
        Ok(ObjectMetadata {
            name: location.name.clone(),
            bucket: location.bucket.clone(),
            media_link: String::new(),
            self_link: None,
            size: Some(bytes.len().to_string()),
            content_type: Some(content_type.to_string()),
        })
    }
}

/// One observed conversion call.
#[derive(Debug, Clone)]
pub(crate) struct ConvertCall {
    pub profile: Profile,
    pub input: PathBuf,
    pub output: PathBuf,
    pub input_bytes: Vec<u8>,
}

/// [`Converter`] that records calls and either fails or writes
/// `converted:<input bytes>` to the output path.
#[derive(Default)]
pub(crate) struct RecordingConverter {
    calls: Mutex<Vec<ConvertCall>>,
    fail: AtomicBool,
}

impl RecordingConverter {
    pub fn failing() -> Self {
        let converter = Self::default();
        converter.fail.store(true, Ordering::SeqCst);
        converter
    }

    pub fn calls(&self) -> Vec<ConvertCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Converter for RecordingConverter {
    async fn convert(
        &self,
        profile: Profile,
        input: &std::path::Path,
        output: &std::path::Path,
    ) -> Result<(), PipelineError> {
        let input_bytes = tokio::fs::read(input).await.unwrap_or_default();
        self.calls.lock().unwrap().push(ConvertCall {
            profile,
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            input_bytes: input_bytes.clone(),
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::Conversion {
                input: input.to_path_buf(),
                message: "exit status: 1".into(),
                output: "convert: improper image header".into(),
            });
        }
        let mut converted = b"converted:".to_vec();
        converted.extend_from_slice(&input_bytes);
        tokio::fs::write(output, converted).await.unwrap();
        Ok(())
    }
}
