//! 题目详情 - 只读投影

use std::fmt;

use crate::models::{Complexity, Question, QuestionType};

/// 需要人工批改时的提示语
pub const MANUAL_GRADING_NOTICE: &str = "Requires manual grading.";

/// 详情中的一个选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionLine {
    /// 显示标签，如 `(A)`
    pub label: String,
    pub text: String,
    pub correct: bool,
}

/// 题目详情
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDetail {
    pub id: String,
    pub subject: String,
    pub kind: QuestionType,
    pub complexity: Complexity,
    pub text: String,
    pub options: Vec<OptionLine>,
    /// 大写答案键，如 `B` 或 `A, C`；无选项时为 None
    pub answer_key: Option<String>,
    pub expected_answer: Option<String>,
    pub manual_grading: bool,
    pub max_score: u32,
    pub tags: Vec<String>,
}

/// 生成题目详情
pub fn inspect(question: &Question) -> QuestionDetail {
    let options: Vec<OptionLine> = question
        .options
        .iter()
        .map(|o| OptionLine {
            label: format!("({})", o.id.to_uppercase()),
            text: o.text.clone(),
            correct: o.correct,
        })
        .collect();

    let answer_key = (!options.is_empty()).then(|| {
        question
            .answer_key()
            .iter()
            .map(|id| id.to_uppercase())
            .collect::<Vec<_>>()
            .join(", ")
    });

    QuestionDetail {
        id: question.id.clone(),
        subject: question.subject.clone(),
        kind: question.kind,
        complexity: question.complexity,
        text: question.text.clone(),
        options,
        answer_key,
        expected_answer: question.expected_answer.clone(),
        manual_grading: question.kind.requires_manual_grading(),
        max_score: question.max_score,
        tags: question.tags.clone(),
    }
}

impl fmt::Display for QuestionDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Question #{} Details", self.id)?;
        writeln!(
            f,
            "Subject: {} | Type: {} | Complexity: {} | Max Score: {}",
            self.subject, self.kind, self.complexity, self.max_score
        )?;
        if !self.tags.is_empty() {
            writeln!(f, "Tags: {}", self.tags.join(", "))?;
        }
        writeln!(f, "Question: {}", self.text)?;

        if !self.options.is_empty() {
            writeln!(f, "Options:")?;
            for option in &self.options {
                let mark = if option.correct { "✓" } else { " " };
                writeln!(f, "  [{}] {} {}", mark, option.label, option.text)?;
            }
        }
        if let Some(key) = &self.answer_key {
            writeln!(f, "Correct Answer Key: {}", key)?;
        }
        if let Some(expected) = &self.expected_answer {
            writeln!(f, "Expected Answer: {}", expected)?;
        }
        if self.manual_grading {
            writeln!(f, "{}", MANUAL_GRADING_NOTICE)?;
        }
        Ok(())
    }
}
