use serde::{Deserialize, Serialize};

use crate::error::BusinessError;

/// 题目ID
pub type QuestionId = String;

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    MultipleChoice,
    SingleChoice,
    TrueFalse,
    FillInBlank,
    Matching,
    Essay,
}

impl QuestionType {
    /// 标准名称
    pub fn name(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "MultipleChoice",
            QuestionType::SingleChoice => "SingleChoice",
            QuestionType::TrueFalse => "TrueFalse",
            QuestionType::FillInBlank => "FillInBlank",
            QuestionType::Matching => "Matching",
            QuestionType::Essay => "Essay",
        }
    }

    /// 宽松解析题型标签，兼容导入文件和后端的写法
    pub fn find(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "mcq" | "multiplechoice" | "multichoice" => Some(QuestionType::MultipleChoice),
            "singlechoice" | "single" | "scq" => Some(QuestionType::SingleChoice),
            "truefalse" | "tf" | "boolean" => Some(QuestionType::TrueFalse),
            "fillinblank" | "fillintheblank" | "fill" | "blank" => Some(QuestionType::FillInBlank),
            "matching" | "match" => Some(QuestionType::Matching),
            "essay" | "text" | "longanswer" => Some(QuestionType::Essay),
            _ => None,
        }
    }

    /// 是否通过选项作答
    pub fn uses_options(self) -> bool {
        !matches!(self, QuestionType::Essay | QuestionType::FillInBlank)
    }

    /// 是否需要人工批改
    pub fn requires_manual_grading(self) -> bool {
        matches!(self, QuestionType::Essay)
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Complexity {
    Easy,
    Medium,
    Hard,
}

impl Complexity {
    pub fn name(self) -> &'static str {
        match self {
            Complexity::Easy => "Easy",
            Complexity::Medium => "Medium",
            Complexity::Hard => "Hard",
        }
    }

    pub fn find(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" | "e" | "low" => Some(Complexity::Easy),
            "medium" | "m" | "normal" => Some(Complexity::Medium),
            "hard" | "h" | "high" => Some(Complexity::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    /// 选项标识（小写字母 a, b, c …）
    pub id: String,
    pub text: String,
    pub correct: bool,
}

impl QuestionOption {
    pub fn new(id: impl Into<String>, text: impl Into<String>, correct: bool) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            correct,
        }
    }
}

/// 题目
///
/// 答案键不单独存储，而是由 `correct = true` 的选项推导出来，
/// 因此"答案键恰好指向正确选项"始终成立。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub subject: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub complexity: Complexity,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    /// 填空题的参考答案
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_answer: Option<String>,
    #[serde(default = "default_max_score")]
    pub max_score: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_max_score() -> u32 {
    1
}

impl Question {
    /// 创建一道没有选项的题目，选项通过 `with_options` 追加
    pub fn new(
        id: impl Into<QuestionId>,
        text: impl Into<String>,
        subject: impl Into<String>,
        kind: QuestionType,
        complexity: Complexity,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            subject: subject.into(),
            kind,
            complexity,
            options: Vec::new(),
            expected_answer: None,
            max_score: default_max_score(),
            tags: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Vec<QuestionOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_expected_answer(mut self, answer: impl Into<String>) -> Self {
        self.expected_answer = Some(answer.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// 答案键：所有正确选项的标识，按选项顺序
    pub fn answer_key(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|o| o.correct)
            .map(|o| o.id.as_str())
            .collect()
    }

    /// 检查题目结构是否合法
    pub fn validate(&self) -> Result<(), BusinessError> {
        let invalid = |reason: String| BusinessError::InvalidQuestion { reason };

        if self.id.trim().is_empty() {
            return Err(invalid("题目ID为空".to_string()));
        }
        if self.text.trim().is_empty() {
            return Err(invalid(format!("题目 {} 的题干为空", self.id)));
        }

        let mut seen = std::collections::HashSet::new();
        for option in &self.options {
            if !seen.insert(option.id.as_str()) {
                return Err(invalid(format!(
                    "题目 {} 的选项标识重复: {}",
                    self.id, option.id
                )));
            }
        }

        match self.kind {
            QuestionType::Essay | QuestionType::FillInBlank if !self.options.is_empty() => {
                Err(invalid(format!("{} 题不能带选项", self.kind)))
            }
            kind if kind.uses_options() && self.answer_key().is_empty() => Err(invalid(format!(
                "题目 {} 至少需要一个正确选项",
                self.id
            ))),
            QuestionType::SingleChoice | QuestionType::TrueFalse
                if self.answer_key().len() > 1 =>
            {
                Err(invalid(format!("{} 题只能有一个正确选项", self.kind)))
            }
            _ => Ok(()),
        }
    }
}
