//! Read-only view models derived from a [`DashboardState`] snapshot.

use crate::core::time::{format_clock, format_month_day};
use crate::models::{Analysis, ClassAnalyses, ClassInsight, InsightRow, StudentGroup};
use crate::services::fragments::{collapse_text, normalize_exercises, render_any, Exercise, Fragment};

use super::state::{ClassDetail, DashboardState};

const RECENT_PER_CLASS: usize = 6;
const NAMES_PER_CLASS: usize = 20;
const DETAIL_LIST_LIMIT: usize = 8;
const DETAIL_ROW_LIMIT: usize = 50;

const DETECTED_TEXT_CHARS: usize = 500;
const SPECIFIC_ERROR_CHARS: usize = 220;
const REASONING_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HistoryEntry {
    pub(crate) position: String,
    pub(crate) id: String,
    pub(crate) student_name: String,
    pub(crate) subject: String,
    pub(crate) date: String,
    pub(crate) time: String,
    pub(crate) error_percentage: f64,
    pub(crate) selected: bool,
}

pub(crate) fn history_entries(state: &DashboardState) -> Vec<HistoryEntry> {
    let selected = state.current_analysis.as_ref().map(|analysis| analysis.id.as_str());

    state
        .analyses
        .iter()
        .enumerate()
        .map(|(index, analysis)| HistoryEntry {
            position: format!("#{}", index + 1),
            id: analysis.id.clone(),
            student_name: analysis.student_name.clone(),
            subject: analysis.subject.clone(),
            date: analysis.timestamp.map(format_month_day).unwrap_or_default(),
            time: analysis.timestamp.map(format_clock).unwrap_or_default(),
            error_percentage: analysis.data.error_percentage,
            selected: analysis.has_id() && selected == Some(analysis.id.as_str()),
        })
        .collect()
}

pub(crate) fn history_footer(count: usize) -> String {
    let noun = if count == 1 { "Analysis performed" } else { "Analyses performed" };
    format!("{count} {noun}")
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResultsView {
    Processing,
    Empty,
    Ready(Box<ResultsCard>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResultsCard {
    pub(crate) student_name: String,
    pub(crate) subject: String,
    pub(crate) date: String,
    pub(crate) score_label: Option<String>,
    pub(crate) difficulty: String,
    pub(crate) main_concept: String,
    pub(crate) specific_error: String,
    pub(crate) recurrence: &'static str,
    pub(crate) detected_text: Option<String>,
    pub(crate) reasoning: Option<String>,
    pub(crate) concepts: Vec<String>,
    pub(crate) suggestions: Vec<String>,
    pub(crate) historical_analysis: Option<Fragment>,
    pub(crate) teacher_suggestion: Option<Fragment>,
    pub(crate) exercises: Vec<Exercise>,
}

pub(crate) fn results_view(state: &DashboardState, expanded: bool) -> ResultsView {
    if state.is_processing {
        return ResultsView::Processing;
    }

    match &state.current_analysis {
        Some(analysis) if analysis.has_id() => ResultsView::Ready(Box::new(results_card(analysis, expanded))),
        _ => ResultsView::Empty,
    }
}

pub(crate) fn results_card(analysis: &Analysis, expanded: bool) -> ResultsCard {
    let data = &analysis.data;
    let insight = &data.insight;
    let fragment = |value: &Option<serde_json::Value>| value.as_ref().and_then(render_any);

    ResultsCard {
        student_name: analysis.student_name.clone(),
        subject: analysis.subject.clone(),
        date: analysis
            .timestamp
            .map(|at| format!("{} {}", format_month_day(at), format_clock(at)))
            .unwrap_or_else(|| "Unknown Date".to_string()),
        score_label: data.score.as_ref().and_then(|score| score.label.clone()),
        difficulty: format!("{}% difficulty", data.error_percentage),
        main_concept: insight.main_concept.clone(),
        specific_error: collapse_text(&insight.specific_error, SPECIFIC_ERROR_CHARS, expanded),
        recurrence: if insight.is_recurrent { "Recurrent Pattern" } else { "First Occurrence" },
        detected_text: data
            .detected_text
            .as_deref()
            .map(|text| collapse_text(text, DETECTED_TEXT_CHARS, expanded)),
        reasoning: data.reasoning.as_deref().map(|text| collapse_text(text, REASONING_CHARS, expanded)),
        concepts: data.concepts.clone(),
        suggestions: data.suggestions.clone(),
        historical_analysis: fragment(&insight.historical_analysis),
        teacher_suggestion: fragment(&insight.suggestion_for_teacher),
        exercises: insight
            .generated_micro_exercise
            .as_ref()
            .map(normalize_exercises)
            .unwrap_or_default(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LevelStats {
    pub(crate) advanced: usize,
    pub(crate) intermediate: usize,
    pub(crate) needs_support: usize,
    pub(crate) total: usize,
}

pub(crate) fn level_stats(groups: &[StudentGroup], roster_size: usize) -> LevelStats {
    let count = |id: &str| {
        groups.iter().find(|group| group.id == id).map(|group| group.students.len()).unwrap_or(0)
    };

    LevelStats {
        advanced: count("advanced"),
        intermediate: count("intermediate"),
        needs_support: count("needs-support"),
        total: roster_size,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecentAnalysis {
    pub(crate) id: String,
    pub(crate) student_name: String,
    pub(crate) subject: String,
    pub(crate) error_percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassCard {
    pub(crate) class_name: String,
    pub(crate) title: String,
    pub(crate) summary: String,
    pub(crate) recent: Vec<RecentAnalysis>,
    pub(crate) student_names: Vec<String>,
}

pub(crate) fn class_cards(classes: &[ClassAnalyses]) -> Vec<ClassCard> {
    classes.iter().map(class_card).collect()
}

fn class_card(class: &ClassAnalyses) -> ClassCard {
    let average = class
        .average_error
        .map(|value| format!("{value}%"))
        .unwrap_or_else(|| "n/a".to_string());

    let mut student_names: Vec<String> = Vec::new();
    for analysis in &class.analyses {
        if student_names.len() == NAMES_PER_CLASS {
            break;
        }
        if !student_names.contains(&analysis.student_name) {
            student_names.push(analysis.student_name.clone());
        }
    }

    ClassCard {
        class_name: class.class_name.clone(),
        title: format!("Class {}", class.class_name),
        summary: format!("{} analyses · Avg error: {average}", class.count),
        recent: class
            .analyses
            .iter()
            .take(RECENT_PER_CLASS)
            .map(|analysis| RecentAnalysis {
                id: analysis.id.clone(),
                student_name: analysis.student_name.clone(),
                subject: analysis.subject.clone(),
                error_percentage: analysis.data.error_percentage,
            })
            .collect(),
        student_names,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ClassDetailView {
    Closed,
    Loading(String),
    Ready {
        class_name: String,
        student_count: u64,
        average_error: Option<f64>,
        common_errors: Vec<String>,
        suggestions: Vec<String>,
        rows: Vec<InsightRow>,
    },
}

pub(crate) fn class_detail(detail: &ClassDetail) -> ClassDetailView {
    match detail {
        ClassDetail::Closed => ClassDetailView::Closed,
        ClassDetail::Loading { class_name } => ClassDetailView::Loading(class_name.clone()),
        ClassDetail::Loaded(insight) => ready_detail(insight),
    }
}

fn ready_detail(insight: &ClassInsight) -> ClassDetailView {
    ClassDetailView::Ready {
        class_name: insight.class_name.clone(),
        student_count: insight.student_count,
        average_error: insight.average_error,
        common_errors: insight.common_errors.iter().take(DETAIL_LIST_LIMIT).cloned().collect(),
        suggestions: insight.suggestions.iter().take(DETAIL_LIST_LIMIT).cloned().collect(),
        rows: insight.detailed.iter().take(DETAIL_ROW_LIMIT).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupMember, InsightRow};
    use crate::test_support::analysis_fixture;
    use serde_json::json;

    #[test]
    fn history_entries_number_and_mark_selection() {
        let mut state = DashboardState::default();
        state.analyses = vec![analysis_fixture("a2", "Ana", 30.0), analysis_fixture("a1", "Bruno", 50.0)];
        state.current_analysis = Some(state.analyses[1].clone());

        let entries = history_entries(&state);
        assert_eq!(entries[0].position, "#1");
        assert_eq!(entries[1].position, "#2");
        assert!(!entries[0].selected);
        assert!(entries[1].selected);
        assert_eq!(entries[0].date, "03/01");
        assert_eq!(entries[0].time, "10:00 AM");

        assert_eq!(history_footer(1), "1 Analysis performed");
        assert_eq!(history_footer(0), "0 Analyses performed");
    }

    #[test]
    fn results_view_tracks_processing() {
        let mut state = DashboardState::default();
        state.is_processing = true;
        assert_eq!(results_view(&state, false), ResultsView::Processing);

        state.is_processing = false;
        assert_eq!(results_view(&state, false), ResultsView::Empty);
    }

    #[test]
    fn analysis_without_id_is_not_shown() {
        let mut state = DashboardState::default();
        state.current_analysis = Some(analysis_fixture("", "Ana", 20.0));
        assert_eq!(results_view(&state, false), ResultsView::Empty);

        state.current_analysis = Some(analysis_fixture("a1", "Ana", 20.0));
        assert!(matches!(results_view(&state, false), ResultsView::Ready(_)));
    }

    #[test]
    fn results_card_collapses_long_text_and_renders_insights() {
        let mut analysis = analysis_fixture("a1", "Ana", 35.0);
        analysis.data.reasoning = Some("r".repeat(400));
        analysis.data.insight.is_recurrent = true;
        analysis.data.insight.generated_micro_exercise = Some(json!({"title": "Practice", "prompt": "2/4 = ?"}));
        analysis.data.insight.suggestion_for_teacher = Some(json!("Use pizza fractions"));

        let card = results_card(&analysis, false);
        assert_eq!(card.difficulty, "35% difficulty");
        assert_eq!(card.recurrence, "Recurrent Pattern");
        assert_eq!(card.reasoning.as_ref().map(|text| text.chars().count()), Some(301));
        assert_eq!(card.exercises[0].title.as_deref(), Some("Practice"));
        assert_eq!(card.teacher_suggestion, Some(Fragment::Text("Use pizza fractions".to_string())));

        let expanded = results_card(&analysis, true);
        assert_eq!(expanded.reasoning.as_ref().map(String::len), Some(400));
    }

    #[test]
    fn level_stats_use_known_group_ids() {
        let member = GroupMember {
            id: "s1".to_string(),
            name: "Ana".to_string(),
            class_name: "5th A".to_string(),
            rationale: None,
        };
        let group = |id: &str, size: usize| StudentGroup {
            id: id.to_string(),
            name: id.to_string(),
            level: Default::default(),
            color: None,
            description: String::new(),
            criteria: None,
            students: vec![member.clone(); size],
            common_errors: Vec::new(),
            suggestions: Vec::new(),
        };

        let stats = level_stats(&[group("advanced", 2), group("needs-support", 1), group("other", 4)], 9);
        assert_eq!(stats, LevelStats { advanced: 2, intermediate: 0, needs_support: 1, total: 9 });
    }

    #[test]
    fn class_cards_are_capped() {
        let analyses: Vec<Analysis> = (0..30)
            .map(|n| analysis_fixture(&format!("a{n}"), &format!("Student {}", n % 25), 10.0))
            .collect();
        let class = ClassAnalyses {
            class_name: "5th A".to_string(),
            count: 30,
            average_error: Some(32.5),
            analyses,
        };

        let cards = class_cards(&[class]);
        assert_eq!(cards[0].title, "Class 5th A");
        assert_eq!(cards[0].summary, "30 analyses · Avg error: 32.5%");
        assert_eq!(cards[0].recent.len(), 6);
        assert_eq!(cards[0].student_names.len(), 20);
    }

    #[test]
    fn class_detail_limits_lists() {
        let insight = ClassInsight {
            class_name: "5th A".to_string(),
            student_count: 12,
            average_error: Some(40.0),
            common_errors: (0..12).map(|n| format!("error {n}")).collect(),
            suggestions: (0..3).map(|n| format!("tip {n}")).collect(),
            detailed: (0..60)
                .map(|n| InsightRow {
                    analysis_id: format!("a{n}"),
                    student_name: "Ana".to_string(),
                    error_percentage: None,
                    short_rationale: None,
                })
                .collect(),
        };

        let ClassDetailView::Ready { common_errors, suggestions, rows, .. } =
            class_detail(&ClassDetail::Loaded(insight))
        else {
            panic!("expected a loaded detail");
        };
        assert_eq!(common_errors.len(), 8);
        assert_eq!(suggestions.len(), 3);
        assert_eq!(rows.len(), 50);
        assert_eq!(class_detail(&ClassDetail::Closed), ClassDetailView::Closed);
    }
}
