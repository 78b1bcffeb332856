//! 发布状态流转 - 业务能力层
//!
//! Draft ⇄ Published。切换本身没有前置条件；
//! `publish_warnings` 只负责指出问题，是否拦截由调用方决定。

use crate::models::{Exam, ExamStatus};
use crate::services::catalog::Catalog;

/// 切换考试的发布状态，返回切换前的状态；考试不存在时返回 None
pub fn toggle_publish(exams: &mut [Exam], exam_id: &str) -> Option<ExamStatus> {
    let exam = exams.iter_mut().find(|e| e.id == exam_id)?;
    let previous = exam.status;
    exam.status = previous.toggled();
    Some(previous)
}

/// 发布前发现的问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishWarning {
    /// 没有题目
    NoQuestions,
    /// 结束时间早于开始时间
    InvertedWindow,
    /// 时间无法解析或为空
    MissingWindow,
    /// 引用了题库中已不存在的题目
    DanglingQuestions(Vec<String>),
    /// 题目数快照与当前题目列表不一致
    StaleTotal { recorded: usize, actual: usize },
}

impl std::fmt::Display for PublishWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishWarning::NoQuestions => write!(f, "考试没有题目"),
            PublishWarning::InvertedWindow => write!(f, "结束时间早于开始时间"),
            PublishWarning::MissingWindow => write!(f, "开始/结束时间缺失或无法解析"),
            PublishWarning::DanglingQuestions(ids) => {
                write!(f, "引用了不存在的题目: {}", ids.join(", "))
            }
            PublishWarning::StaleTotal { recorded, actual } => {
                write!(f, "题目数快照为 {}，实际可用 {}", recorded, actual)
            }
        }
    }
}

/// 检查考试是否适合发布
pub fn publish_warnings(exam: &Exam, catalog: &Catalog) -> Vec<PublishWarning> {
    let mut warnings = Vec::new();

    if exam.question_ids.is_empty() {
        warnings.push(PublishWarning::NoQuestions);
    }
    match exam.window() {
        None => warnings.push(PublishWarning::MissingWindow),
        Some((start, end)) if end < start => warnings.push(PublishWarning::InvertedWindow),
        Some(_) => {}
    }

    let dangling: Vec<String> = exam
        .question_ids
        .iter()
        .filter(|id| !catalog.contains(id))
        .cloned()
        .collect();
    let actual = exam.question_ids.len() - dangling.len();
    if !dangling.is_empty() {
        warnings.push(PublishWarning::DanglingQuestions(dangling));
    }
    if actual != exam.total_questions {
        warnings.push(PublishWarning::StaleTotal {
            recorded: exam.total_questions,
            actual,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Complexity, Question, QuestionType};

    fn exam(id: &str, question_ids: &[&str]) -> Exam {
        Exam {
            id: id.into(),
            title: "Quiz1".into(),
            duration: 30,
            start_time: "2026-11-02T09:00".into(),
            end_time: "2026-11-02T10:00".into(),
            status: ExamStatus::Draft,
            question_ids: question_ids.iter().map(|s| s.to_string()).collect(),
            total_questions: question_ids.len(),
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![Question::new(
            "Q1",
            "capital of France",
            "Geo",
            QuestionType::Essay,
            Complexity::Easy,
        )])
    }

    #[test]
    fn toggling_twice_restores_status() {
        let mut exams = vec![exam("e1", &["Q1"]), exam("e2", &["Q1"])];
        assert_eq!(toggle_publish(&mut exams, "e1"), Some(ExamStatus::Draft));
        assert_eq!(exams[0].status, ExamStatus::Published);
        assert_eq!(exams[1].status, ExamStatus::Draft);

        assert_eq!(toggle_publish(&mut exams, "e1"), Some(ExamStatus::Published));
        assert_eq!(exams[0], exam("e1", &["Q1"]));
    }

    #[test]
    fn unknown_exam_is_none() {
        let mut exams = vec![exam("e1", &["Q1"])];
        assert_eq!(toggle_publish(&mut exams, "nope"), None);
    }

    #[test]
    fn healthy_exam_has_no_warnings() {
        assert!(publish_warnings(&exam("e1", &["Q1"]), &catalog()).is_empty());
    }

    #[test]
    fn warnings_cover_known_gaps() {
        let mut e = exam("e1", &[]);
        e.start_time = "2026-11-02T10:00".into();
        e.end_time = "2026-11-02T09:00".into();
        let warnings = publish_warnings(&e, &catalog());
        assert!(warnings.contains(&PublishWarning::NoQuestions));
        assert!(warnings.contains(&PublishWarning::InvertedWindow));

        let mut e = exam("e2", &["Q1", "Q7"]);
        e.end_time.clear();
        let warnings = publish_warnings(&e, &catalog());
        assert!(warnings.contains(&PublishWarning::MissingWindow));
        assert!(warnings.contains(&PublishWarning::DanglingQuestions(vec!["Q7".into()])));
        assert!(warnings.contains(&PublishWarning::StaleTotal { recorded: 2, actual: 1 }));
    }
}
