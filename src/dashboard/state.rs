use std::time::{Duration, Instant};

use crate::models::{Analysis, ClassAnalyses, ClassInsight, Grouping, Student};
use crate::schemas::class::ClassSummary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum View {
    #[default]
    Landing,
    Upload,
    Results,
    Groups,
    Classes,
    Students,
}

impl View {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::Upload => "upload",
            Self::Results => "results",
            Self::Groups => "groups",
            Self::Classes => "classes",
            Self::Students => "students",
        }
    }
}

/// Independently versioned parts of the state that asynchronous requests
/// write into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slice {
    History,
    Submission,
    Selection,
    Students,
    Groups,
    Classes,
    ClassOptions,
    ClassInsight,
}

impl Slice {
    const COUNT: usize = 8;

    fn index(self) -> usize {
        match self {
            Self::History => 0,
            Self::Submission => 1,
            Self::Selection => 2,
            Self::Students => 3,
            Self::Groups => 4,
            Self::Classes => 5,
            Self::ClassOptions => 6,
            Self::ClassInsight => 7,
        }
    }

    /// Slices invalidated whenever the active view changes. History is shared
    /// by every view and survives navigation.
    const VIEW_BOUND: [Slice; 7] = [
        Slice::Submission,
        Slice::Selection,
        Slice::Students,
        Slice::Groups,
        Slice::Classes,
        Slice::ClassOptions,
        Slice::ClassInsight,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RequestTicket {
    pub(crate) slice: Slice,
    pub(crate) generation: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Generations([u64; Slice::COUNT]);

impl Generations {
    fn bump(&mut self, slice: Slice) -> RequestTicket {
        let generation = &mut self.0[slice.index()];
        *generation += 1;
        RequestTicket { slice, generation: *generation }
    }

    fn is_current(&self, ticket: RequestTicket) -> bool {
        self.0[ticket.slice.index()] == ticket.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Notice {
    pub(crate) kind: NoticeKind,
    pub(crate) message: String,
    pub(crate) expires_at: Instant,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) enum ClassDetail {
    #[default]
    Closed,
    Loading {
        class_name: String,
    },
    Loaded(ClassInsight),
}

#[derive(Debug, Clone)]
pub(crate) enum Action {
    Start,
    NewAnalysis,
    Navigate(View),
    HistoryLoaded { ticket: RequestTicket, analyses: Vec<Analysis> },
    SubmissionStarted,
    SubmissionCompleted { ticket: RequestTicket, analysis: Analysis },
    SubmissionFailed { ticket: RequestTicket },
    AnalysisSelected { ticket: RequestTicket, analysis: Analysis },
    StudentsLoaded { ticket: RequestTicket, students: Vec<Student>, filter: Option<String> },
    ClassOptionsLoaded { ticket: RequestTicket, classes: Vec<ClassSummary> },
    GroupsLoaded { ticket: RequestTicket, grouping: Grouping },
    ClassesLoaded { ticket: RequestTicket, classes: Vec<ClassAnalyses> },
    ClassInsightRequested { class_name: String },
    ClassInsightLoaded { ticket: RequestTicket, insight: ClassInsight },
    ClassInsightFailed { ticket: RequestTicket },
    Notify { kind: NoticeKind, message: String },
}

impl Action {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::NewAnalysis => "new_analysis",
            Self::Navigate(_) => "navigate",
            Self::HistoryLoaded { .. } => "history_loaded",
            Self::SubmissionStarted => "submission_started",
            Self::SubmissionCompleted { .. } => "submission_completed",
            Self::SubmissionFailed { .. } => "submission_failed",
            Self::AnalysisSelected { .. } => "analysis_selected",
            Self::StudentsLoaded { .. } => "students_loaded",
            Self::ClassOptionsLoaded { .. } => "class_options_loaded",
            Self::GroupsLoaded { .. } => "groups_loaded",
            Self::ClassesLoaded { .. } => "classes_loaded",
            Self::ClassInsightRequested { .. } => "class_insight_requested",
            Self::ClassInsightLoaded { .. } => "class_insight_loaded",
            Self::ClassInsightFailed { .. } => "class_insight_failed",
            Self::Notify { .. } => "notify",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DashboardState {
    pub(crate) view: View,
    pub(crate) is_processing: bool,
    pub(crate) current_analysis: Option<Analysis>,
    /// Most recent first.
    pub(crate) analyses: Vec<Analysis>,
    pub(crate) students: Vec<Student>,
    pub(crate) student_filter: Option<String>,
    pub(crate) class_options: Vec<ClassSummary>,
    pub(crate) grouping: Option<Grouping>,
    pub(crate) class_analyses: Vec<ClassAnalyses>,
    pub(crate) class_detail: ClassDetail,
    pub(crate) notices: Vec<Notice>,
    generations: Generations,
}

impl DashboardState {
    /// Issues a ticket for a new request on `slice`, invalidating any request
    /// already in flight there.
    pub(crate) fn issue(&mut self, slice: Slice) -> RequestTicket {
        self.generations.bump(slice)
    }

    pub(crate) fn is_current(&self, ticket: RequestTicket) -> bool {
        self.generations.is_current(ticket)
    }

    /// Applies one action. Returns whether the state changed; responses
    /// carrying a stale ticket are dropped.
    pub(crate) fn apply(&mut self, action: Action, now: Instant, notice_ttl: Duration) -> bool {
        self.notices.retain(|notice| notice.expires_at > now);

        match action {
            Action::Start => self.navigate(View::Upload),
            Action::NewAnalysis => {
                self.current_analysis = None;
                self.navigate(View::Upload);
            }
            Action::Navigate(view) => self.navigate(view),
            Action::HistoryLoaded { ticket, analyses } => {
                if !self.is_current(ticket) {
                    return false;
                }
                self.analyses = analyses;
            }
            Action::SubmissionStarted => {
                self.navigate(View::Results);
                self.current_analysis = None;
                self.is_processing = true;
            }
            Action::SubmissionCompleted { ticket, analysis } => {
                let current = self.is_current(ticket);
                self.analyses.retain(|existing| !analysis.has_id() || existing.id != analysis.id);
                self.analyses.insert(0, analysis.clone());
                if current {
                    self.is_processing = false;
                    self.current_analysis = Some(analysis);
                }
            }
            Action::SubmissionFailed { ticket } => {
                if !self.is_current(ticket) {
                    return false;
                }
                self.is_processing = false;
                self.current_analysis = None;
            }
            Action::AnalysisSelected { ticket, analysis } => {
                if !self.is_current(ticket) {
                    return false;
                }
                self.navigate(View::Results);
                self.is_processing = false;
                self.current_analysis = Some(analysis);
            }
            Action::StudentsLoaded { ticket, students, filter } => {
                if !self.is_current(ticket) {
                    return false;
                }
                self.students = students;
                self.student_filter = filter;
            }
            Action::ClassOptionsLoaded { ticket, classes } => {
                if !self.is_current(ticket) {
                    return false;
                }
                self.class_options = classes;
            }
            Action::GroupsLoaded { ticket, grouping } => {
                if !self.is_current(ticket) {
                    return false;
                }
                self.grouping = Some(grouping);
            }
            Action::ClassesLoaded { ticket, classes } => {
                if !self.is_current(ticket) {
                    return false;
                }
                self.class_analyses = classes;
            }
            Action::ClassInsightRequested { class_name } => {
                self.class_detail = ClassDetail::Loading { class_name };
            }
            Action::ClassInsightLoaded { ticket, insight } => {
                if !self.is_current(ticket) {
                    return false;
                }
                self.class_detail = ClassDetail::Loaded(insight);
            }
            Action::ClassInsightFailed { ticket } => {
                if !self.is_current(ticket) {
                    return false;
                }
                self.class_detail = ClassDetail::Closed;
            }
            Action::Notify { kind, message } => {
                self.notices.push(Notice { kind, message, expires_at: now + notice_ttl });
            }
        }

        true
    }

    fn navigate(&mut self, view: View) {
        for slice in Slice::VIEW_BOUND {
            self.generations.bump(slice);
        }
        if view != View::Results {
            self.is_processing = false;
        }
        if view != View::Classes {
            self.class_detail = ClassDetail::Closed;
        }
        self.view = view;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::analysis_fixture;

    const TTL: Duration = Duration::from_secs(3);

    #[test]
    fn start_and_new_analysis_lead_to_upload() {
        let now = Instant::now();
        let mut state = DashboardState::default();
        assert_eq!(state.view, View::Landing);

        state.apply(Action::Start, now, TTL);
        assert_eq!(state.view, View::Upload);

        state.current_analysis = Some(analysis_fixture("a1", "Ana", 10.0));
        state.view = View::Results;
        state.apply(Action::NewAnalysis, now, TTL);
        assert_eq!(state.view, View::Upload);
        assert!(state.current_analysis.is_none());
    }

    #[test]
    fn submission_moves_to_results_before_completion() {
        let now = Instant::now();
        let mut state = DashboardState::default();

        state.apply(Action::SubmissionStarted, now, TTL);
        let ticket = state.issue(Slice::Submission);
        assert_eq!(state.view, View::Results);
        assert!(state.is_processing);
        assert!(state.current_analysis.is_none());

        let analysis = analysis_fixture("a1", "Ana", 25.0);
        assert!(state.apply(Action::SubmissionCompleted { ticket, analysis }, now, TTL));
        assert!(!state.is_processing);
        assert_eq!(state.current_analysis.as_ref().map(|a| a.id.as_str()), Some("a1"));
        assert_eq!(state.analyses.len(), 1);
    }

    #[test]
    fn failed_submission_stays_on_results() {
        let now = Instant::now();
        let mut state = DashboardState::default();

        state.apply(Action::SubmissionStarted, now, TTL);
        let ticket = state.issue(Slice::Submission);
        state.apply(Action::SubmissionFailed { ticket }, now, TTL);

        assert_eq!(state.view, View::Results);
        assert!(!state.is_processing);
        assert!(state.current_analysis.is_none());
    }

    #[test]
    fn late_submission_only_extends_history() {
        let now = Instant::now();
        let mut state = DashboardState::default();

        state.apply(Action::SubmissionStarted, now, TTL);
        let ticket = state.issue(Slice::Submission);
        state.apply(Action::Navigate(View::Groups), now, TTL);

        let analysis = analysis_fixture("a9", "Ana", 25.0);
        state.apply(Action::SubmissionCompleted { ticket, analysis }, now, TTL);

        assert_eq!(state.view, View::Groups);
        assert!(state.current_analysis.is_none());
        assert!(!state.is_processing);
        assert_eq!(state.analyses[0].id, "a9");
    }

    #[test]
    fn stale_load_after_navigation_is_dropped() {
        let now = Instant::now();
        let mut state = DashboardState::default();

        state.apply(Action::Navigate(View::Students), now, TTL);
        let stale = state.issue(Slice::Students);
        state.apply(Action::Navigate(View::Classes), now, TTL);

        let students = vec![Student {
            id: "s1".to_string(),
            name: "Ana".to_string(),
            class_name: "5th A".to_string(),
        }];
        let applied = state.apply(
            Action::StudentsLoaded { ticket: stale, students, filter: None },
            now,
            TTL,
        );

        assert!(!applied);
        assert!(state.students.is_empty());
    }

    #[test]
    fn reissued_request_supersedes_the_previous_one() {
        let now = Instant::now();
        let mut state = DashboardState::default();
        let first = state.issue(Slice::History);
        let second = state.issue(Slice::History);

        assert!(!state.apply(
            Action::HistoryLoaded { ticket: first, analyses: vec![analysis_fixture("old", "Ana", 1.0)] },
            now,
            TTL
        ));
        assert!(state.apply(
            Action::HistoryLoaded { ticket: second, analyses: vec![analysis_fixture("new", "Ana", 1.0)] },
            now,
            TTL
        ));
        assert_eq!(state.analyses[0].id, "new");
    }

    #[test]
    fn notices_expire_after_ttl() {
        let now = Instant::now();
        let mut state = DashboardState::default();
        state.apply(
            Action::Notify { kind: NoticeKind::Success, message: "Student added".to_string() },
            now,
            TTL,
        );

        assert_eq!(state.notices[0].expires_at, now + TTL);

        state.apply(Action::Navigate(View::Students), now + Duration::from_secs(2), TTL);
        assert_eq!(state.notices.len(), 1);
        assert_eq!(state.view.as_str(), "students");

        state.apply(Action::Navigate(View::Upload), now + TTL, TTL);
        assert!(state.notices.is_empty());
    }

    #[test]
    fn class_insight_failure_clears_detail() {
        let now = Instant::now();
        let mut state = DashboardState::default();
        state.apply(Action::Navigate(View::Classes), now, TTL);
        state.apply(Action::ClassInsightRequested { class_name: "5th A".to_string() }, now, TTL);
        let ticket = state.issue(Slice::ClassInsight);
        assert!(matches!(state.class_detail, ClassDetail::Loading { .. }));

        state.apply(Action::ClassInsightFailed { ticket }, now, TTL);
        assert_eq!(state.class_detail, ClassDetail::Closed);
    }
}
