//! 考试服务的请求 / 响应结构，以及与本地模型的转换

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{
    parse_form_time, Complexity, Exam, ExamStatus, Question, QuestionOption, QuestionType,
};
use crate::services::importer::DEFAULT_SUBJECT;

/// 服务端时间格式
const WIRE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// 题型在服务端的写法
pub fn ques_type_name(kind: QuestionType) -> &'static str {
    match kind {
        QuestionType::MultipleChoice => "multiple_choice",
        QuestionType::SingleChoice => "single_choice",
        QuestionType::TrueFalse => "true_false",
        QuestionType::FillInBlank => "fill_in_blank",
        QuestionType::Matching => "matching",
        QuestionType::Essay => "text",
    }
}

fn status_name(status: ExamStatus) -> String {
    status.name().to_ascii_lowercase()
}

fn parse_status(raw: &str) -> ExamStatus {
    if raw.eq_ignore_ascii_case("published") {
        ExamStatus::Published
    } else {
        ExamStatus::Draft
    }
}

/// 表单时间 → 服务端时间
pub fn wire_time(raw: &str) -> Option<String> {
    parse_form_time(raw).map(|t| t.format(WIRE_TIME_FORMAT).to_string())
}

// ========== 题目 ==========

/// `POST /exam/create-question` 请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionCreate {
    pub title: String,
    pub complexity: String,
    pub ques_type: String,
    pub options: Map<String, Value>,
    pub correct_answers: Map<String, Value>,
    pub max_score: u32,
    pub tags: Vec<String>,
}

impl From<&Question> for QuestionCreate {
    fn from(q: &Question) -> Self {
        let options: Map<String, Value> = q
            .options
            .iter()
            .map(|o| (o.id.to_uppercase(), Value::String(o.text.clone())))
            .collect();

        let key: Vec<Value> = q
            .answer_key()
            .iter()
            .map(|id| Value::String(id.to_uppercase()))
            .collect();
        let mut correct_answers = Map::new();
        match q.kind {
            QuestionType::SingleChoice | QuestionType::TrueFalse => {
                if let Some(first) = key.into_iter().next() {
                    correct_answers.insert("selected_option".to_string(), first);
                }
            }
            _ if q.kind.uses_options() => {
                correct_answers.insert("selected_options".to_string(), Value::Array(key));
            }
            _ => {
                if let Some(answer) = &q.expected_answer {
                    correct_answers
                        .insert("model_answer".to_string(), Value::String(answer.clone()));
                }
            }
        }

        // 服务端没有科目字段，科目作为第一个标签
        let mut tags = vec![q.subject.clone()];
        tags.extend(q.tags.iter().filter(|t| **t != q.subject).cloned());

        Self {
            title: q.text.clone(),
            complexity: q.complexity.name().to_string(),
            ques_type: ques_type_name(q.kind).to_string(),
            options,
            correct_answers,
            max_score: q.max_score,
            tags,
        }
    }
}

/// 服务端返回的题目
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionOut {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub complexity: String,
    pub ques_type: String,
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub correct_answers: Map<String, Value>,
    #[serde(default)]
    pub max_score: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl QuestionOut {
    /// 转换为本地题目；题型无法识别时返回原因
    pub fn into_question(self) -> Result<Question, String> {
        let kind = QuestionType::find(&self.ques_type)
            .ok_or_else(|| format!("未知题型: {}", self.ques_type))?;
        // 服务端的难度是自由文本（如 "Class 1"），无法识别时按中等处理
        let complexity = Complexity::find(&self.complexity).unwrap_or(Complexity::Medium);

        let mut correct: Vec<String> = Vec::new();
        if let Some(v) = self.correct_answers.get("selected_option") {
            correct.push(value_text(v).to_lowercase());
        }
        if let Some(Value::Array(items)) = self.correct_answers.get("selected_options") {
            correct.extend(items.iter().map(|v| value_text(v).to_lowercase()));
        }
        let expected_answer = self
            .correct_answers
            .get("model_answer")
            .or_else(|| self.correct_answers.get("answer"))
            .map(value_text);

        let options: Vec<QuestionOption> = self
            .options
            .iter()
            .map(|(id, text)| {
                let id = id.to_lowercase();
                let is_correct = correct.contains(&id);
                QuestionOption::new(id, value_text(text), is_correct)
            })
            .collect();

        let subject = self
            .tags
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

        let mut question = Question::new(self.id, self.title, subject, kind, complexity)
            .with_options(options)
            .with_tags(self.tags);
        question.expected_answer = expected_answer;
        if let Some(score) = self.max_score {
            question.max_score = score;
        }
        Ok(question)
    }
}

/// `POST /exam/import-excel` 的返回
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportSummaryOut {
    pub total_rows_parsed: usize,
    pub new_questions_created: usize,
    pub import_successful: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

// ========== 考试 ==========

/// `POST /exam/create-exam` 请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamCreate {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub question_ids: Vec<String>,
}

impl TryFrom<&Exam> for ExamCreate {
    type Error = String;

    fn try_from(exam: &Exam) -> Result<Self, Self::Error> {
        let start_time =
            wire_time(&exam.start_time).ok_or_else(|| format!("开始时间无效: '{}'", exam.start_time))?;
        let end_time =
            wire_time(&exam.end_time).ok_or_else(|| format!("结束时间无效: '{}'", exam.end_time))?;
        Ok(Self {
            title: exam.title.clone(),
            start_time,
            end_time,
            duration_minutes: exam.duration,
            question_ids: exam.question_ids.clone(),
        })
    }
}

/// `PATCH /exam/update-exam/{id}` 请求体，未设置的字段不发送
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExamUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_ids: Option<Vec<String>>,
}

impl ExamUpdate {
    pub fn status(status: ExamStatus) -> Self {
        Self {
            status: Some(status_name(status)),
            ..Default::default()
        }
    }
}

/// 服务端返回的考试
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExamOut {
    pub id: String,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub status: String,
    #[serde(default)]
    pub questions_order: Vec<String>,
}

impl From<ExamOut> for Exam {
    fn from(out: ExamOut) -> Self {
        Exam {
            id: out.id,
            title: out.title,
            duration: out.duration_minutes,
            start_time: out.start_time,
            end_time: out.end_time,
            status: parse_status(&out.status),
            total_questions: out.questions_order.len(),
            question_ids: out.questions_order,
        }
    }
}

// ========== 用户 ==========

/// `GET /auth/current-user/`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CurrentUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}
