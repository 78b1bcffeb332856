use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::question::QuestionId;

/// 考试ID
pub type ExamId = String;

/// 考试状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExamStatus {
    Draft,
    Published,
}

impl ExamStatus {
    /// 切换状态：Draft ⇄ Published
    pub fn toggled(self) -> Self {
        match self {
            ExamStatus::Draft => ExamStatus::Published,
            ExamStatus::Published => ExamStatus::Draft,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExamStatus::Draft => "Draft",
            ExamStatus::Published => "Published",
        }
    }
}

impl std::fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 考试
///
/// `total_questions` 是创建时的快照，之后题目被删除也不会重新计算。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub title: String,
    /// 时长（分钟）
    pub duration: u32,
    /// 开始时间，原样保存表单输入
    pub start_time: String,
    /// 结束时间，原样保存表单输入
    pub end_time: String,
    pub status: ExamStatus,
    pub question_ids: Vec<QuestionId>,
    pub total_questions: usize,
}

/// 表单里常见的几种时间写法
const TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// 解析表单时间字符串
pub fn parse_form_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

impl Exam {
    /// 解析后的时间窗口；任一端为空或无法解析时返回 None
    pub fn window(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((parse_form_time(&self.start_time)?, parse_form_time(&self.end_time)?))
    }

    /// 结束时间是否早于开始时间
    pub fn has_inverted_window(&self) -> bool {
        matches!(self.window(), Some((start, end)) if end < start)
    }

    pub fn is_published(&self) -> bool {
        self.status == ExamStatus::Published
    }
}
