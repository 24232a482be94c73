use std::path::PathBuf;
use std::time::Duration;

use time::OffsetDateTime;

use crate::core::state::AppState;
use crate::models::{Analysis, Grouping, Student};
use crate::services::backend_client::BackendClient;
use crate::services::normalize::{
    normalize_analyses, normalize_analysis, normalize_class_analyses, normalize_class_insight,
    normalize_grouping,
};
use crate::services::progress_chart::{self, ChartOutput, ChartPoint};
use crate::services::report::{build_report, write_report};
use crate::services::upload::{read_upload, ExampleLibrary, ExerciseUpload, UploadSelection};

use super::fallback::fallback_grouping;
use super::state::{Action, DashboardState, NoticeKind, Slice, View};
use super::store::DashboardStore;

const MISSING_FIELDS: &str = "Please provide both name and class";
const DUPLICATE_STUDENT: &str = "Student with this name already exists in the selected class";
const DUPLICATE_STUDENT_SERVER: &str = "Student already exists (server)";
const ADD_STUDENT_FAILED: &str = "Failed to add student";
const STUDENT_ADDED: &str = "Student added";
const INSIGHTS_LOADED: &str = "Class insights loaded";
const INSIGHTS_FAILED: &str = "Failed to load class insights";

/// Where the exercise image for a submission comes from.
#[derive(Debug, Clone)]
pub(crate) enum UploadSource {
    File(PathBuf),
    Example(String),
}

/// Turns user intents into backend calls and store actions.
#[derive(Clone)]
pub(crate) struct Dashboard {
    app: AppState,
    store: DashboardStore,
    examples: ExampleLibrary,
}

impl Dashboard {
    pub(crate) fn new(app: AppState) -> Self {
        let ttl = Duration::from_secs(app.settings().display().notice_ttl_seconds);
        let examples = ExampleLibrary::from_settings(app.settings());
        Self { app, store: DashboardStore::new(ttl), examples }
    }

    pub(crate) fn store(&self) -> &DashboardStore {
        &self.store
    }

    pub(crate) fn examples(&self) -> &ExampleLibrary {
        &self.examples
    }

    pub(crate) fn default_subject(&self) -> &str {
        &self.app.settings().upload().default_subject
    }

    pub(crate) async fn snapshot(&self) -> DashboardState {
        self.store.snapshot().await
    }

    fn client(&self) -> &BackendClient {
        self.app.client()
    }

    async fn notify(&self, kind: NoticeKind, message: impl Into<String>) {
        self.store.dispatch(Action::Notify { kind, message: message.into() }).await;
    }

    pub(crate) async fn start(&self) {
        self.store.dispatch(Action::Start).await;
    }

    pub(crate) async fn new_analysis(&self) {
        self.store.dispatch(Action::NewAnalysis).await;
    }

    /// Loads the roster and the analysis history together. Failures leave
    /// the corresponding list empty.
    pub(crate) async fn load_initial(&self) {
        let filter = self.snapshot().await.student_filter;
        tokio::join!(self.reload_history(), self.reload_students(filter));
    }

    async fn reload_history(&self) {
        let ticket = self.store.issue(Slice::History).await;
        let analyses = match self.client().list_analyses().await {
            Ok(raw) => normalize_analyses(&raw, self.app.settings().display()),
            Err(err) => {
                tracing::error!(error = %err, "Failed to load analysis history");
                Vec::new()
            }
        };
        self.store.dispatch(Action::HistoryLoaded { ticket, analyses }).await;
    }

    async fn reload_students(&self, filter: Option<String>) {
        let ticket = self.store.issue(Slice::Students).await;
        let students = match self.client().list_students(filter.as_deref()).await {
            Ok(students) => students,
            Err(err) => {
                tracing::error!(error = %err, class = ?filter, "Failed to load students");
                Vec::new()
            }
        };
        self.store.dispatch(Action::StudentsLoaded { ticket, students, filter }).await;
    }

    /// Submits an exercise image. The view switches to results with the
    /// processing flag set before the request is sent; the returned analysis
    /// is `None` when validation or the backend call failed.
    pub(crate) async fn submit_upload(
        &self,
        selection: &UploadSelection,
        source: UploadSource,
    ) -> Option<Analysis> {
        let (student_id, subject) = match selection.require() {
            Ok(pair) => pair,
            Err(err) => {
                self.notify(NoticeKind::Error, err.to_string()).await;
                return None;
            }
        };

        let upload = match self.resolve_upload(subject, source).await {
            Ok(upload) => upload,
            Err(err) => {
                tracing::warn!(error = %err, subject, "Exercise image rejected");
                self.notify(NoticeKind::Error, err.to_string()).await;
                return None;
            }
        };

        self.store.dispatch(Action::SubmissionStarted).await;
        let ticket = self.store.issue(Slice::Submission).await;
        tracing::info!(student_id, subject, file = %upload.file_name, "Submitting exercise for analysis");

        match self.client().analyze_exercise(&upload, Some(student_id), subject).await {
            Ok(response) => {
                if !response.ocr_info.is_null() {
                    tracing::debug!(ocr_info = %response.ocr_info, "Backend OCR details");
                }
                let analysis = normalize_analysis(&response.analysis, self.app.settings().display());
                self.store
                    .dispatch(Action::SubmissionCompleted { ticket, analysis: analysis.clone() })
                    .await;
                Some(analysis)
            }
            Err(err) => {
                tracing::error!(error = %err, student_id, subject, "Exercise analysis failed");
                self.store.dispatch(Action::SubmissionFailed { ticket }).await;
                self.notify(NoticeKind::Error, format!("Analysis failed: {err}")).await;
                None
            }
        }
    }

    async fn resolve_upload(
        &self,
        subject: &str,
        source: UploadSource,
    ) -> Result<ExerciseUpload, crate::services::upload::UploadError> {
        let settings = self.app.settings();
        match source {
            UploadSource::File(path) => read_upload(&path, settings).await,
            UploadSource::Example(name) => self.examples.load(subject, &name, settings).await,
        }
    }

    /// Shows an analysis from the history, fetching it when it is not loaded.
    pub(crate) async fn select_analysis(&self, analysis_id: &str) -> Option<Analysis> {
        let ticket = self.store.issue(Slice::Selection).await;
        let known = self.snapshot().await.analyses.into_iter().find(|analysis| analysis.id == analysis_id);

        let analysis = match known {
            Some(analysis) => analysis,
            None => match self.client().get_analysis(analysis_id).await {
                Ok(raw) => normalize_analysis(&raw, self.app.settings().display()),
                Err(err) => {
                    tracing::error!(error = %err, analysis_id, "Failed to load analysis");
                    let message = if err.is_not_found() {
                        format!("Analysis {analysis_id} not found")
                    } else {
                        format!("Failed to load analysis {analysis_id}")
                    };
                    self.notify(NoticeKind::Error, message).await;
                    return None;
                }
            },
        };

        self.store.dispatch(Action::AnalysisSelected { ticket, analysis: analysis.clone() }).await;
        Some(analysis)
    }

    pub(crate) async fn view_groups(&self) -> Grouping {
        self.store.dispatch(Action::Navigate(View::Groups)).await;
        let ticket = self.store.issue(Slice::Groups).await;

        let grouping = match self.client().student_groups().await {
            Ok(response) => normalize_grouping(&response, self.app.settings().display()),
            Err(err) => {
                tracing::error!(error = %err, "Error loading groups; using heuristic fallback");
                let state = self.snapshot().await;
                fallback_grouping(&state.students, &state.analyses)
            }
        };

        self.store.dispatch(Action::GroupsLoaded { ticket, grouping: grouping.clone() }).await;
        grouping
    }

    /// Asks the backend to regroup. On failure the current groups stay.
    pub(crate) async fn recompute_groups(&self) -> Option<Grouping> {
        let ticket = self.store.issue(Slice::Groups).await;

        match self.client().recompute_groups().await {
            Ok(response) => {
                let grouping = normalize_grouping(&response, self.app.settings().display());
                self.store.dispatch(Action::GroupsLoaded { ticket, grouping: grouping.clone() }).await;
                Some(grouping)
            }
            Err(err) => {
                tracing::error!(error = %err, "Error recomputing groups");
                None
            }
        }
    }

    pub(crate) async fn view_classes(&self) {
        self.store.dispatch(Action::Navigate(View::Classes)).await;
        let ticket = self.store.issue(Slice::Classes).await;

        let classes = match self.client().analyses_by_class().await {
            Ok(response) => response
                .groups
                .iter()
                .map(|raw| normalize_class_analyses(raw, self.app.settings().display()))
                .collect(),
            Err(err) => {
                tracing::error!(error = %err, "Failed to load class analyses");
                Vec::new()
            }
        };

        self.store.dispatch(Action::ClassesLoaded { ticket, classes }).await;
    }

    /// Opens the class detail panel and fills it with fresh insights.
    pub(crate) async fn load_class_insight(&self, class_name: &str, force: bool) -> bool {
        self.store
            .dispatch(Action::ClassInsightRequested { class_name: class_name.to_string() })
            .await;
        let ticket = self.store.issue(Slice::ClassInsight).await;

        match self.client().class_insights(class_name, force).await {
            Ok(raw) => {
                let insight = normalize_class_insight(&raw, class_name, self.app.settings().display());
                self.store.dispatch(Action::ClassInsightLoaded { ticket, insight }).await;
                self.notify(NoticeKind::Success, INSIGHTS_LOADED).await;
                true
            }
            Err(err) => {
                tracing::error!(error = %err, class = class_name, "Failed to load class insights");
                self.store.dispatch(Action::ClassInsightFailed { ticket }).await;
                self.notify(NoticeKind::Error, INSIGHTS_FAILED).await;
                false
            }
        }
    }

    pub(crate) async fn view_students(&self) {
        self.store.dispatch(Action::Navigate(View::Students)).await;
        let filter = self.snapshot().await.student_filter;
        tokio::join!(self.reload_students(filter), self.reload_class_options());
    }

    async fn reload_class_options(&self) {
        let ticket = self.store.issue(Slice::ClassOptions).await;
        match self.client().list_classes().await {
            Ok(classes) => {
                self.store.dispatch(Action::ClassOptionsLoaded { ticket, classes }).await;
            }
            Err(err) => tracing::warn!(error = %err, "Failed to load class list"),
        }
    }

    /// Creates a student after the local duplicate check. Returns the created
    /// record; every outcome is reported as a notice.
    pub(crate) async fn add_student(&self, name: &str, class_name: &str) -> Option<Student> {
        let name = name.trim();
        let class_name = class_name.trim();
        if name.is_empty() || class_name.is_empty() {
            self.notify(NoticeKind::Error, MISSING_FIELDS).await;
            return None;
        }

        let state = self.snapshot().await;
        let duplicate = state.students.iter().any(|student| {
            student.name.trim().to_lowercase() == name.to_lowercase()
                && student.class_name.trim().to_lowercase() == class_name.to_lowercase()
        });
        if duplicate {
            tracing::info!(name, class = class_name, "Duplicate student rejected locally");
            self.notify(NoticeKind::Error, DUPLICATE_STUDENT).await;
            return None;
        }

        match self.client().create_student(name, class_name).await {
            Ok(student) => {
                tracing::info!(student_id = %student.id, name, class = class_name, "Student created");
                self.notify(NoticeKind::Success, STUDENT_ADDED).await;
                self.reload_students(state.student_filter).await;
                Some(student)
            }
            Err(err) if err.is_conflict() => {
                self.notify(NoticeKind::Error, DUPLICATE_STUDENT_SERVER).await;
                None
            }
            Err(err) => {
                tracing::error!(error = %err, name, class = class_name, "Failed to create student");
                self.notify(NoticeKind::Error, ADD_STUDENT_FAILED).await;
                None
            }
        }
    }

    /// Looks a student up in the loaded roster, then on the backend.
    pub(crate) async fn find_student(&self, student_id: &str) -> Option<Student> {
        let loaded = self.snapshot().await.students.into_iter().find(|student| student.id == student_id);
        if loaded.is_some() {
            return loaded;
        }

        match self.client().get_student(student_id).await {
            Ok(student) => Some(student),
            Err(err) => {
                tracing::warn!(error = %err, student_id, "Student lookup failed");
                None
            }
        }
    }

    pub(crate) async fn delete_student(&self, student_id: &str) -> bool {
        let deleted = match self.client().delete_student(student_id).await {
            Ok(()) => {
                tracing::info!(student_id, "Student deleted");
                true
            }
            Err(err) => {
                tracing::error!(error = %err, student_id, "Failed to delete student");
                false
            }
        };

        let filter = self.snapshot().await.student_filter;
        self.reload_students(filter).await;
        deleted
    }

    /// Reloads the roster for one class; an empty name clears the filter.
    pub(crate) async fn filter_students(&self, class_name: Option<&str>) {
        let filter = class_name.map(str::trim).filter(|value| !value.is_empty()).map(ToString::to_string);
        self.reload_students(filter).await;
    }

    /// Writes the JSON report for the analysis shown in the results view.
    pub(crate) async fn download_report(&self, output_dir: Option<PathBuf>) -> anyhow::Result<Option<PathBuf>> {
        let state = self.snapshot().await;
        let Some(report) =
            build_report(state.current_analysis.as_ref(), &state.analyses, OffsetDateTime::now_utc())
        else {
            tracing::warn!("No saved analysis selected; report skipped");
            return Ok(None);
        };

        let dir = output_dir.unwrap_or_else(|| PathBuf::from(&self.app.settings().report().output_dir));
        write_report(&report, &dir).await.map(Some)
    }

    /// Progress chart over every loaded analysis of `student_name`.
    pub(crate) async fn progress_chart(&self, student_name: &str) -> ChartOutput {
        let state = self.snapshot().await;
        let history: Vec<Analysis> = state
            .analyses
            .into_iter()
            .filter(|analysis| analysis.student_name == student_name)
            .collect();
        progress_chart::render(&ChartPoint::from_history(&history))
    }
}
