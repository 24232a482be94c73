use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::dashboard::views::{
    class_cards, class_detail, history_entries, history_footer, level_stats, results_view,
    ClassCard, ClassDetailView, HistoryEntry, LevelStats, ResultsCard, ResultsView,
};
use crate::dashboard::{Dashboard, DashboardState, Notice, NoticeKind, UploadSource};
use crate::models::Grouping;
use crate::services::fragments::Fragment;
use crate::services::upload::{UploadSelection, SUBJECTS};

pub(crate) const USAGE: &str = "\
usage: pedagogical-radar <command> [options]

commands:
  students [--class <name>]                 list the roster
  add-student <name> <class>                add a student
  remove-student <id>                       delete a student
  analyses                                  analysis history
  show <analysis-id> [--full]               one analysis
  analyze --student <id> [--subject <s>] (<file> | --example <name>)
  examples <subject>                        example images for a subject
  groups [--recompute]                      student groups
  classes                                   analyses grouped by class
  class <name> [--force]                    class insight detail
  report <analysis-id> [--out <dir>]        write a JSON report
  progress <student-name> [--out <file>]    progress chart as SVG
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    Students { class_name: Option<String> },
    AddStudent { name: String, class_name: String },
    RemoveStudent { id: String },
    Analyses,
    Show { id: String, full: bool },
    Analyze { student_id: Option<String>, subject: Option<String>, source: Source },
    Examples { subject: String },
    Groups { recompute: bool },
    Classes,
    Class { name: String, force: bool },
    Report { id: String, out: Option<PathBuf> },
    Progress { student_name: String, out: Option<PathBuf> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Source {
    File(PathBuf),
    Example(String),
}

pub(crate) fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };

    let mut positional = Vec::new();
    let mut class_name = None;
    let mut student_id = None;
    let mut subject = None;
    let mut example = None;
    let mut out = None;
    let mut recompute = false;
    let mut force = false;
    let mut full = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--class" => class_name = Some(args.next().ok_or_else(|| anyhow!("--class missing value"))?),
            "--student" => {
                student_id = Some(args.next().ok_or_else(|| anyhow!("--student missing value"))?);
            }
            "--subject" => {
                subject = Some(args.next().ok_or_else(|| anyhow!("--subject missing value"))?);
            }
            "--example" => {
                example = Some(args.next().ok_or_else(|| anyhow!("--example missing value"))?);
            }
            "--out" => out = Some(PathBuf::from(args.next().ok_or_else(|| anyhow!("--out missing value"))?)),
            "--recompute" => recompute = true,
            "--force" => force = true,
            "--full" => full = true,
            flag if flag.starts_with("--") => return Err(anyhow!("Unknown argument: {flag}")),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let mut required = |what: &str| positional.next().ok_or_else(|| anyhow!("{command}: missing {what}"));

    let parsed = match command.as_str() {
        "help" | "--help" | "-h" => Command::Help,
        "students" => Command::Students { class_name },
        "add-student" => Command::AddStudent { name: required("name")?, class_name: required("class")? },
        "remove-student" => Command::RemoveStudent { id: required("student id")? },
        "analyses" => Command::Analyses,
        "show" => Command::Show { id: required("analysis id")?, full },
        "analyze" => {
            let source = match (example, required("file").ok()) {
                (Some(name), None) => Source::Example(name),
                (None, Some(path)) => Source::File(PathBuf::from(path)),
                (Some(_), Some(_)) => return Err(anyhow!("analyze: pass either a file or --example")),
                (None, None) => return Err(anyhow!("analyze: missing file or --example")),
            };
            Command::Analyze { student_id, subject, source }
        }
        "examples" => Command::Examples { subject: required("subject")? },
        "groups" => Command::Groups { recompute },
        "classes" => Command::Classes,
        "class" => Command::Class { name: required("class name")?, force },
        "report" => Command::Report { id: required("analysis id")?, out },
        "progress" => Command::Progress { student_name: required("student name")?, out },
        other => return Err(anyhow!("Unknown command: {other}")),
    };

    Ok(parsed)
}

pub(crate) async fn execute(dashboard: &Dashboard, command: Command) -> Result<()> {
    let mut journal = dashboard.store().subscribe_notices();
    let output = match command {
        Command::Help => USAGE.to_string(),
        Command::Students { class_name } => {
            dashboard.view_students().await;
            if class_name.is_some() {
                dashboard.filter_students(class_name.as_deref()).await;
            }
            render_students(&dashboard.snapshot().await)
        }
        Command::AddStudent { name, class_name } => {
            dashboard.view_students().await;
            match dashboard.add_student(&name, &class_name).await {
                Some(student) => format!("{}  {}  {}\n", student.id, student.name, student.class_name),
                None => String::new(),
            }
        }
        Command::RemoveStudent { id } => {
            dashboard.view_students().await;
            let label = match dashboard.find_student(&id).await {
                Some(student) => format!("{} ({})", student.name, student.class_name),
                None => id.clone(),
            };
            if dashboard.delete_student(&id).await {
                format!("Removed {label}\n")
            } else {
                format!("Could not remove {label}\n")
            }
        }
        Command::Analyses => {
            dashboard.load_initial().await;
            let state = dashboard.snapshot().await;
            render_history(&history_entries(&state), state.analyses.len())
        }
        Command::Show { id, full } => {
            dashboard.load_initial().await;
            dashboard.select_analysis(&id).await;
            render_results(&results_view(&dashboard.snapshot().await, full))
        }
        Command::Analyze { student_id, subject, source } => {
            dashboard.new_analysis().await;
            let subject = subject.unwrap_or_else(|| dashboard.default_subject().to_string());
            let selection = UploadSelection::new(student_id.as_deref(), Some(&subject));
            let source = match source {
                Source::File(path) => UploadSource::File(path),
                Source::Example(name) => UploadSource::Example(name),
            };

            let mut revisions = dashboard.store().subscribe();
            let watched = dashboard.clone();
            let progress = tokio::spawn(async move {
                while revisions.changed().await.is_ok() {
                    if matches!(results_view(&watched.snapshot().await, false), ResultsView::Processing) {
                        eprintln!("Analyzing the test...");
                        break;
                    }
                }
            });

            dashboard.submit_upload(&selection, source).await;
            progress.abort();
            render_results(&results_view(&dashboard.snapshot().await, false))
        }
        Command::Examples { subject } => match dashboard.examples().list(&subject).await {
            Ok(files) => files
                .iter()
                .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
                .map(|name| format!("{name}\n"))
                .collect(),
            Err(err) => format!("{err}\nSubjects: {}\n", SUBJECTS.join(", ")),
        },
        Command::Groups { recompute } => {
            dashboard.load_initial().await;
            let mut grouping = dashboard.view_groups().await;
            if recompute {
                grouping = dashboard.recompute_groups().await.unwrap_or(grouping);
            }
            let roster = dashboard.snapshot().await.students.len();
            render_groups(&grouping, level_stats(&grouping.groups, roster))
        }
        Command::Classes => {
            dashboard.view_classes().await;
            render_class_cards(&class_cards(&dashboard.snapshot().await.class_analyses))
        }
        Command::Class { name, force } => {
            dashboard.view_classes().await;
            dashboard.load_class_insight(&name, force).await;
            render_class_detail(&class_detail(&dashboard.snapshot().await.class_detail))
        }
        Command::Report { id, out } => {
            dashboard.load_initial().await;
            dashboard.select_analysis(&id).await;
            match dashboard.download_report(out).await? {
                Some(path) => format!("Report written to {}\n", path.display()),
                None => "No saved analysis to report on\n".to_string(),
            }
        }
        Command::Progress { student_name, out } => {
            dashboard.load_initial().await;
            let chart = dashboard.progress_chart(&student_name).await;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, chart.markup())
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    format!("Chart written to {}\n", path.display())
                }
                None => format!("{}\n", chart.markup().trim_end()),
            }
        }
    };

    print!("{output}");
    print!("{}", render_notices(&drain_notices(&mut journal)));
    Ok(())
}

fn render_students(state: &DashboardState) -> String {
    let mut out = String::new();
    if let Some(filter) = &state.student_filter {
        let _ = writeln!(out, "Class filter: {filter}");
    }
    if state.students.is_empty() {
        out.push_str("No students found\n");
    }
    for student in &state.students {
        let _ = writeln!(out, "{}  {}  {}", student.id, student.name, student.class_name);
    }
    if !state.class_options.is_empty() {
        let classes: Vec<String> = state
            .class_options
            .iter()
            .map(|class| match class.student_count {
                Some(count) => format!("{} ({count})", class.class_name),
                None => class.class_name.clone(),
            })
            .collect();
        let _ = writeln!(out, "Classes: {}", classes.join(", "));
    }
    out
}

fn render_history(entries: &[HistoryEntry], count: usize) -> String {
    let mut out = String::from("Analysis History\n");
    if entries.is_empty() {
        out.push_str("No analyses yet\n");
    }
    for entry in entries {
        let _ = writeln!(
            out,
            "{:>4}  {}  {} {}  {}  {}  {}%",
            entry.position,
            entry.id,
            entry.date,
            entry.time,
            entry.student_name,
            entry.subject,
            entry.error_percentage
        );
    }
    let _ = writeln!(out, "{}", history_footer(count));
    out
}

fn render_results(view: &ResultsView) -> String {
    match view {
        ResultsView::Processing => "Analyzing the test...\n".to_string(),
        ResultsView::Empty => "No analysis selected\n".to_string(),
        ResultsView::Ready(card) => render_card(card),
    }
}

fn render_card(card: &ResultsCard) -> String {
    let mut out = String::from("Full Analysis\n");
    let _ = writeln!(out, "{} | {} | {}", card.student_name, card.subject, card.date);
    if let Some(label) = &card.score_label {
        let _ = writeln!(out, "Score: {label}");
    }
    if let Some(text) = &card.detected_text {
        let _ = writeln!(out, "\nAnalyzed Text Sample\n{text}");
    }
    let _ = writeln!(out, "\nMain Concept ({})\n{}", card.difficulty, card.main_concept);
    if !card.concepts.is_empty() {
        let _ = writeln!(out, "Related concepts: {}", card.concepts.join(", "));
    }
    let _ = writeln!(out, "\nSpecific Error [{}]\n{}", card.recurrence, card.specific_error);
    if let Some(reasoning) = &card.reasoning {
        let _ = writeln!(out, "AI Analysis: {reasoning}");
    }
    if !card.suggestions.is_empty() {
        out.push_str("\nSuggestions\n");
        for suggestion in &card.suggestions {
            let _ = writeln!(out, "- {suggestion}");
        }
    }
    if let Some(fragment) = &card.historical_analysis {
        let _ = write!(out, "\nHistorical Analysis\n{}", render_fragment(fragment));
    }
    if let Some(fragment) = &card.teacher_suggestion {
        let _ = write!(out, "\nSuggestion for the Teacher\n{}", render_fragment(fragment));
    }
    for (index, exercise) in card.exercises.iter().enumerate() {
        let _ = writeln!(out, "\nExercise {}{}", index + 1, exercise.title.as_deref().map(|t| format!(": {t}")).unwrap_or_default());
        if let Some(prompt) = &exercise.prompt {
            let _ = writeln!(out, "{prompt}");
        }
        for example in &exercise.examples {
            let _ = writeln!(out, "  e.g. {example}");
        }
        if let Some(hints) = &exercise.hints {
            let _ = writeln!(out, "Hints: {hints}");
        }
        if !exercise.answers.is_empty() {
            let _ = writeln!(out, "Answer: {}", exercise.answers.join(" / "));
        }
    }
    out
}

fn render_fragment(fragment: &Fragment) -> String {
    match fragment {
        Fragment::Text(text) | Fragment::Code(text) => format!("{text}\n"),
        Fragment::List(items) => items.iter().map(|item| format!("- {item}\n")).collect(),
    }
}

fn render_groups(grouping: &Grouping, stats: LevelStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Student Groups [{}]", grouping.meta.mode_label());
    let _ = writeln!(
        out,
        "Advanced: {}  Intermediate: {}  Need Support: {}  Total Students: {}",
        stats.advanced, stats.intermediate, stats.needs_support, stats.total
    );
    for group in &grouping.groups {
        let _ = writeln!(out, "\n{} {} ({} students)", group.level.marker(), group.name, group.students.len());
        if !group.description.is_empty() {
            let _ = writeln!(out, "{}", group.description);
        }
        if let Some(criteria) = &group.criteria {
            let _ = writeln!(out, "Criteria: {criteria}");
        }
        for member in &group.students {
            let rationale = member.rationale.as_deref().map(|r| format!(": {r}")).unwrap_or_default();
            let _ = writeln!(out, "  {} ({}){rationale}", member.name, member.class_name);
        }
        if !group.common_errors.is_empty() {
            let _ = writeln!(out, "Common errors: {}", group.common_errors.join("; "));
        }
        if !group.suggestions.is_empty() {
            let _ = writeln!(out, "Suggestions: {}", group.suggestions.join("; "));
        }
    }
    out
}

fn render_class_cards(cards: &[ClassCard]) -> String {
    if cards.is_empty() {
        return "No class analyses available\n".to_string();
    }

    let mut out = String::new();
    for card in cards {
        let _ = writeln!(out, "{}\n{}", card.title, card.summary);
        for recent in &card.recent {
            let _ = writeln!(out, "  {}  {}  {}  {}%", recent.id, recent.student_name, recent.subject, recent.error_percentage);
        }
        let _ = writeln!(out, "Students: {}\n", card.student_names.join(", "));
    }
    out
}

fn render_class_detail(detail: &ClassDetailView) -> String {
    match detail {
        ClassDetailView::Closed => String::new(),
        ClassDetailView::Loading(class_name) => format!("Loading insights for {class_name}...\n"),
        ClassDetailView::Ready { class_name, student_count, average_error, common_errors, suggestions, rows } => {
            let mut out = String::new();
            let average = average_error.map(|value| format!("{value}%")).unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(out, "Class {class_name}: {student_count} students, avg error {average}");
            out.push_str("Common errors\n");
            for error in common_errors {
                let _ = writeln!(out, "- {error}");
            }
            out.push_str("Suggestions\n");
            for suggestion in suggestions {
                let _ = writeln!(out, "- {suggestion}");
            }
            for row in rows {
                let percentage = row.error_percentage.map(|value| format!("{value}%")).unwrap_or_default();
                let rationale = row.short_rationale.as_deref().unwrap_or_default();
                let _ = writeln!(out, "  {}  {}  {percentage}  {rationale}", row.analysis_id, row.student_name);
            }
            out
        }
    }
}

/// Every notice recorded while the command ran, expired or not.
fn drain_notices(journal: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    loop {
        match journal.try_recv() {
            Ok(notice) => notices.push(notice),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Notice journal overflowed");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    notices
}

fn render_notices(notices: &[Notice]) -> String {
    notices
        .iter()
        .map(|notice| match notice.kind {
            NoticeKind::Success => format!("ok: {}\n", notice.message),
            NoticeKind::Error => format!("error: {}\n", notice.message),
        })
        .collect()
}
