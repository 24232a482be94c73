use crate::models::{Analysis, GroupLevel, GroupMember, Grouping, GroupingMeta, Student, StudentGroup};

struct Template {
    id: &'static str,
    name: &'static str,
    level: GroupLevel,
    color: &'static str,
    description: &'static str,
    common_errors: &'static [&'static str],
    suggestions: &'static [&'static str],
}

const ADVANCED: Template = Template {
    id: "advanced",
    name: "Advanced Group",
    level: GroupLevel::High,
    color: "bg-green-50 border-green-200",
    description: "Students with good understanding of basic concepts",
    common_errors: &[],
    suggestions: &["Deepening exercises", "Contextualized problems", "Mentoring other students"],
};

const INTERMEDIATE: Template = Template {
    id: "intermediate",
    name: "Intermediate Group",
    level: GroupLevel::Medium,
    color: "bg-yellow-50 border-yellow-200",
    description: "Students with some specific difficulties",
    common_errors: &["Operations with fractions", "Solving simple equations"],
    suggestions: &["Reinforcement in specific concepts", "Directed exercises", "Closer follow-up"],
};

const NEEDS_SUPPORT: Template = Template {
    id: "needs-support",
    name: "Support Group",
    level: GroupLevel::Low,
    color: "bg-red-50 border-red-200",
    description: "Students who need intensive reinforcement",
    common_errors: &["Basic operations", "Number concept", "Problem interpretation"],
    suggestions: &["Individual reinforcement", "Manipulative materials", "Constant monitoring"],
};

/// Heuristic grouping used when the backend cannot provide one: roster order
/// decides the level, and students without any analysis join the
/// intermediate group.
pub(crate) fn fallback_grouping(students: &[Student], analyses: &[Analysis]) -> Grouping {
    let not_analyzed = students
        .iter()
        .filter(|student| !analyses.iter().any(|analysis| analysis.student_name == student.name));

    let advanced: Vec<&Student> = students.iter().take(2).collect();
    let intermediate: Vec<&Student> = students.iter().skip(2).take(3).chain(not_analyzed).collect();
    let needs_support: Vec<&Student> = students.iter().skip(5).take(2).collect();

    let groups = [(ADVANCED, advanced), (INTERMEDIATE, intermediate), (NEEDS_SUPPORT, needs_support)]
        .into_iter()
        .filter(|(_, members)| !members.is_empty())
        .map(|(template, members)| build(&template, &members))
        .collect();

    Grouping { groups, meta: GroupingMeta { llm: false, cached: false } }
}

fn build(template: &Template, members: &[&Student]) -> StudentGroup {
    StudentGroup {
        id: template.id.to_string(),
        name: template.name.to_string(),
        level: template.level,
        color: Some(template.color.to_string()),
        description: template.description.to_string(),
        criteria: None,
        students: members
            .iter()
            .map(|student| GroupMember {
                id: student.id.clone(),
                name: student.name.clone(),
                class_name: student.class_name.clone(),
                rationale: None,
            })
            .collect(),
        common_errors: owned(template.common_errors),
        suggestions: owned(template.suggestions),
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}
