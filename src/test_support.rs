use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};
use uuid::Uuid;

use crate::core::{config::Settings, state::AppState};
use crate::models::{Analysis, Student};
use crate::schemas::analysis::RawAnalysis;
use crate::services::backend_client::BackendClient;
use crate::services::normalize::normalize_analysis;
use crate::services::upload::ExerciseUpload;

/// Smallest valid PNG: a 1x1 transparent pixel.
pub(crate) const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env(base_url: &str) {
    std::env::set_var("RADAR_API_BASE_URL", base_url);
    std::env::set_var("RADAR_ENV", "test");
    std::env::set_var("RADAR_STRICT_CONFIG", "0");
    std::env::set_var("LOG_LEVEL", "debug");
    std::env::remove_var("ENVIRONMENT");
    std::env::remove_var("RADAR_DEFAULT_SUBJECT");
    std::env::remove_var("RADAR_MAX_UPLOAD_SIZE_MB");
    std::env::remove_var("RADAR_ALLOWED_IMAGE_EXTENSIONS");
    std::env::remove_var("RADAR_EXAMPLES_DIR");
    std::env::remove_var("RADAR_REPORT_DIR");
    std::env::remove_var("RADAR_NOTICE_TTL_SECONDS");
    std::env::remove_var("RADAR_UNKNOWN_STUDENT_LABEL");
    std::env::remove_var("RADAR_UNKNOWN_SUBJECT_LABEL");
    std::env::remove_var("RADAR_DEFAULT_CLASS_LABEL");
}

/// Fresh directory under the system temp dir.
pub(crate) fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join("pedagogical-radar-tests").join(Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

pub(crate) fn png_file(file_name: &str) -> PathBuf {
    let path = scratch_dir().join(file_name);
    std::fs::write(&path, PNG_BYTES).expect("write png");
    path
}

pub(crate) fn png_upload(file_name: &str) -> ExerciseUpload {
    ExerciseUpload {
        file_name: file_name.to_string(),
        mime_type: "image/png".to_string(),
        bytes: PNG_BYTES.to_vec(),
    }
}

pub(crate) fn student_fixture(id: &str, name: &str, class_name: &str) -> Student {
    Student { id: id.to_string(), name: name.to_string(), class_name: class_name.to_string() }
}

/// Analysis dated 2025-03-01 10:00 UTC.
pub(crate) fn analysis_fixture(id: &str, student_name: &str, error_percentage: f64) -> Analysis {
    let raw = RawAnalysis {
        id: Some(id.to_string()),
        student_name: Some(student_name.to_string()),
        subject: Some("Mathematics".to_string()),
        timestamp: Some("2025-03-01T10:00:00".to_string()),
        data: json!({"errorPercentage": error_percentage, "mainError": "Adds denominators"}),
    };
    normalize_analysis(&raw, &Default::default())
}

pub(crate) fn client_for(backend: &MockBackend) -> BackendClient {
    BackendClient::from_settings(&Settings::for_backend(&backend.base_url)).expect("client")
}

pub(crate) fn app_state_for(backend: &MockBackend) -> AppState {
    AppState::new(Settings::for_backend(&backend.base_url)).expect("app state")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReceivedUpload {
    pub(crate) file_name: String,
    pub(crate) student_id: Option<String>,
    pub(crate) subject: String,
    pub(crate) size: usize,
}

#[derive(Default)]
struct MockState {
    students: Vec<Student>,
    /// Newest first, as the backend returns them.
    analyses: Vec<Value>,
    next_id: u64,
    create_calls: usize,
    last_upload: Option<ReceivedUpload>,
    last_insight_force: Option<bool>,
    hold_analysis: bool,
    fail_analysis: bool,
    fail_groups: bool,
    fail_insights: bool,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn push_analysis(&mut self, id: String, student_name: &str, subject: &str, error_percentage: f64) -> Value {
        let day = self.analyses.len() + 1;
        let analysis = json!({
            "id": id,
            "studentName": student_name,
            "subject": subject,
            "timestamp": format!("2025-03-{day:02}T10:00:00"),
            "data": {
                "errorPercentage": error_percentage,
                "mainError": "Adds denominators",
                "ai_structured": {"specificError": "Adds numerators and denominators", "isRecurrent": day > 1}
            }
        });
        self.analyses.insert(0, analysis.clone());
        analysis
    }
}

struct Shared {
    state: Mutex<MockState>,
    upload_seen: Notify,
    release: Notify,
}

/// In-process stand-in for the analysis backend, served by axum on an
/// ephemeral port.
pub(crate) struct MockBackend {
    pub(crate) base_url: String,
    shared: Arc<Shared>,
}

impl MockBackend {
    pub(crate) async fn start() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(MockState::default()),
            upload_seen: Notify::new(),
            release: Notify::new(),
        });

        let app = Router::new()
            .route("/students", get(list_students).post(create_student))
            .route("/students/:id", get(get_student).delete(delete_student))
            .route("/analyses", get(list_analyses))
            .route("/analyses/:id", get(get_analysis))
            .route("/analyze_exercise", post(analyze_exercise))
            .route("/student_groups", get(student_groups))
            .route("/student_groups/recompute", post(recompute_groups))
            .route("/analyses_by_class", get(analyses_by_class))
            .route("/classes", get(list_classes))
            .route("/classes/:class_name", get(class_insights))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock backend");
        });

        Self { base_url: format!("http://{addr}"), shared }
    }

    pub(crate) async fn seed_student(&self, name: &str, class_name: &str) -> Student {
        let mut state = self.shared.state.lock().await;
        let id = state.next_id("student");
        let student = student_fixture(&id, name, class_name);
        state.students.push(student.clone());
        student
    }

    pub(crate) async fn seed_analysis(&self, id: &str, student_name: &str, error_percentage: f64) {
        let mut state = self.shared.state.lock().await;
        state.push_analysis(id.to_string(), student_name, "Mathematics", error_percentage);
    }

    pub(crate) async fn create_calls(&self) -> usize {
        self.shared.state.lock().await.create_calls
    }

    pub(crate) async fn last_upload(&self) -> Option<ReceivedUpload> {
        self.shared.state.lock().await.last_upload.clone()
    }

    pub(crate) async fn last_insight_force(&self) -> Option<bool> {
        self.shared.state.lock().await.last_insight_force
    }

    /// Keeps `/analyze_exercise` pending until [`MockBackend::release_analysis`].
    pub(crate) async fn hold_analysis(&self) {
        self.shared.state.lock().await.hold_analysis = true;
    }

    pub(crate) async fn wait_for_upload(&self) {
        self.shared.upload_seen.notified().await;
    }

    pub(crate) async fn release_analysis(&self) {
        self.shared.release.notify_one();
    }

    pub(crate) async fn fail_analysis(&self) {
        self.shared.state.lock().await.fail_analysis = true;
    }

    pub(crate) async fn fail_groups(&self) {
        self.shared.state.lock().await.fail_groups = true;
    }

    pub(crate) async fn fail_insights(&self) {
        self.shared.state.lock().await.fail_insights = true;
    }
}

type SharedState = State<Arc<Shared>>;

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

async fn list_students(
    State(shared): SharedState,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let state = shared.state.lock().await;
    let students: Vec<&Student> = state
        .students
        .iter()
        .filter(|student| query.get("class_name").map_or(true, |class| &student.class_name == class))
        .collect();
    Json(json!({ "students": students })).into_response()
}

async fn create_student(State(shared): SharedState, Json(payload): Json<Value>) -> Response {
    let mut state = shared.state.lock().await;
    state.create_calls += 1;

    let name = payload["name"].as_str().unwrap_or_default().to_string();
    let class_name = payload["class_name"].as_str().unwrap_or_default().to_string();
    let exists = state.students.iter().any(|student| {
        student.name.eq_ignore_ascii_case(&name) && student.class_name.eq_ignore_ascii_case(&class_name)
    });
    if exists {
        return error(StatusCode::CONFLICT, "Student already exists");
    }

    let id = state.next_id("student");
    let student = student_fixture(&id, &name, &class_name);
    state.students.push(student.clone());
    (StatusCode::CREATED, Json(student)).into_response()
}

async fn get_student(State(shared): SharedState, Path(id): Path<String>) -> Response {
    let state = shared.state.lock().await;
    match state.students.iter().find(|student| student.id == id) {
        Some(student) => Json(student.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "Student not found"),
    }
}

async fn delete_student(State(shared): SharedState, Path(id): Path<String>) -> Response {
    let mut state = shared.state.lock().await;
    let before = state.students.len();
    state.students.retain(|student| student.id != id);
    if state.students.len() == before {
        return error(StatusCode::NOT_FOUND, "Student not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_analyses(State(shared): SharedState) -> Response {
    let state = shared.state.lock().await;
    Json(json!({ "analyses": state.analyses })).into_response()
}

async fn get_analysis(State(shared): SharedState, Path(id): Path<String>) -> Response {
    let state = shared.state.lock().await;
    match state.analyses.iter().find(|analysis| analysis["id"] == id.as_str()) {
        Some(analysis) => Json(analysis.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "Analysis not found"),
    }
}

async fn analyze_exercise(State(shared): SharedState, mut multipart: Multipart) -> Response {
    let mut upload = ReceivedUpload {
        file_name: String::new(),
        student_id: None,
        subject: "Mathematics".to_string(),
        size: 0,
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().unwrap_or_default().to_string();
                upload.size = field.bytes().await.map(|bytes| bytes.len()).unwrap_or_default();
            }
            "student_id" => upload.student_id = field.text().await.ok(),
            "subject" => upload.subject = field.text().await.unwrap_or_default(),
            _ => {}
        }
    }

    let (hold, fail) = {
        let mut state = shared.state.lock().await;
        state.last_upload = Some(upload.clone());
        (state.hold_analysis, state.fail_analysis)
    };
    shared.upload_seen.notify_one();

    if fail {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Analysis pipeline unavailable");
    }
    if hold {
        shared.release.notified().await;
    }

    let mut state = shared.state.lock().await;
    let student_name = upload
        .student_id
        .as_deref()
        .and_then(|id| state.students.iter().find(|student| student.id == id))
        .map(|student| student.name.clone())
        .unwrap_or_else(|| "Unknown Student".to_string());
    let id = state.next_id("analysis");
    let analysis = state.push_analysis(id, &student_name, &upload.subject, 35.0);

    Json(json!({ "analysis": analysis, "ocr_info": {"engine": "mock"} })).into_response()
}

fn grouping(cached: bool) -> Value {
    json!({
        "groups": [{
            "id": "advanced",
            "name": "Advanced Group",
            "level": "high",
            "description": "Solid grasp of fractions",
            "students": [
                {"analysisId": "an-1", "studentName": "Ana", "class_name": "5th A", "rationale": "Consistent"},
                {"name": "Bruno"}
            ],
            "commonErrors": [],
            "suggestions": ["Deepening exercises"]
        }],
        "llm": true,
        "cached": cached
    })
}

async fn student_groups(State(shared): SharedState) -> Response {
    if shared.state.lock().await.fail_groups {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Grouping unavailable");
    }
    Json(grouping(true)).into_response()
}

async fn recompute_groups(State(shared): SharedState) -> Response {
    if shared.state.lock().await.fail_groups {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Grouping unavailable");
    }
    Json(grouping(false)).into_response()
}

async fn analyses_by_class(State(shared): SharedState) -> Response {
    let state = shared.state.lock().await;
    Json(json!({
        "groups": [{
            "class_name": "5th A",
            "count": state.analyses.len(),
            "average_error": 30.0,
            "analyses": state.analyses
        }]
    }))
    .into_response()
}

async fn list_classes(State(shared): SharedState) -> Response {
    let state = shared.state.lock().await;
    let mut counts: Vec<(String, usize)> = Vec::new();
    for student in &state.students {
        match counts.iter_mut().find(|(name, _)| *name == student.class_name) {
            Some((_, count)) => *count += 1,
            None => counts.push((student.class_name.clone(), 1)),
        }
    }
    let classes: Vec<Value> = counts
        .into_iter()
        .map(|(class_name, student_count)| json!({"class_name": class_name, "student_count": student_count}))
        .collect();
    Json(json!({ "classes": classes })).into_response()
}

async fn class_insights(
    State(shared): SharedState,
    Path(class_name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut state = shared.state.lock().await;
    state.last_insight_force = Some(query.get("force").is_some_and(|value| value == "true"));
    if state.fail_insights {
        return error(StatusCode::BAD_GATEWAY, "Insight model unavailable");
    }

    Json(json!({
        "class_name": class_name,
        "student_count": state.students.len(),
        "average_error": 35.5,
        "commonErrors": ["Adds denominators"],
        "suggestions": ["Use fraction strips"],
        "detailed": [
            {"analysisId": "an-1", "studentName": "Ana", "errorPercentage": 40, "shortRationale": "Mixes up parts"}
        ]
    }))
    .into_response()
}
