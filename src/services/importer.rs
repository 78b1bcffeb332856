//! 题目导入 - 业务能力层
//!
//! 流程：选择文件 → 解析 → 预览 → 确认合并（或取消）。
//!
//! ```text
//! Idle ──begin_parse──▶ Parsing ──finish_parse──▶ Previewed ──confirm──▶ Idle
//!   ▲                      │                          │
//!   │                      └────────▶ Failed          └──cancel──▶ Idle
//!   └──────────── select_file / cancel（任意状态）
//! ```
//!
//! 解析是唯一的挂起点。每次 `select_file` / `cancel` 都会推进代数，
//! 旧代数的解析结果到达时直接丢弃。

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::ImportError;
use crate::models::{
    load_preview_rows, Complexity, ImportPreviewRow, Question, QuestionOption, QuestionType,
};
use crate::services::id_gen::IdGenerator;

/// 没有科目列也没有标签时使用的科目
pub const DEFAULT_SUBJECT: &str = "General";

/// 待导入的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub path: PathBuf,
}

impl ImportFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// 导入流程状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportState {
    Idle {
        file: Option<ImportFile>,
    },
    Parsing {
        file: ImportFile,
    },
    Previewed {
        file: ImportFile,
        rows: Vec<ImportPreviewRow>,
    },
    Failed {
        file: ImportFile,
        cause: String,
    },
}

/// 状态名，用于事件通知和日志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Idle,
    Parsing,
    Previewed,
    Failed,
}

impl ImportState {
    pub fn phase(&self) -> ImportPhase {
        match self {
            ImportState::Idle { .. } => ImportPhase::Idle,
            ImportState::Parsing { .. } => ImportPhase::Parsing,
            ImportState::Previewed { .. } => ImportPhase::Previewed,
            ImportState::Failed { .. } => ImportPhase::Failed,
        }
    }

    fn name(&self) -> &'static str {
        match self.phase() {
            ImportPhase::Idle => "Idle",
            ImportPhase::Parsing => "Parsing",
            ImportPhase::Previewed => "Previewed",
            ImportPhase::Failed => "Failed",
        }
    }

    pub fn file(&self) -> Option<&ImportFile> {
        match self {
            ImportState::Idle { file } => file.as_ref(),
            ImportState::Parsing { file }
            | ImportState::Previewed { file, .. }
            | ImportState::Failed { file, .. } => Some(file),
        }
    }
}

/// 一次解析的凭据；完成时凭它判断结果是否过期
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTicket {
    generation: u64,
    pub file: ImportFile,
}

impl ParseTicket {
    /// 执行解析（挂起点）
    pub async fn parse(&self) -> Result<Vec<ImportPreviewRow>, ImportError> {
        parse_file(&self.file.path).await
    }
}

/// 解析结果是否被采用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseApplied {
    Applied(ImportPhase),
    Stale,
}

/// 确认导入的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub total_rows_parsed: usize,
    pub new_questions_created: usize,
    pub questions: Vec<Question>,
}

/// 导入状态机
#[derive(Debug)]
pub struct ImportReconciler {
    state: ImportState,
    generation: u64,
}

impl Default for ImportReconciler {
    fn default() -> Self {
        Self {
            state: ImportState::Idle { file: None },
            generation: 0,
        }
    }
}

impl ImportReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ImportState {
        &self.state
    }

    pub fn phase(&self) -> ImportPhase {
        self.state.phase()
    }

    /// 当前预览的行
    pub fn preview(&self) -> Option<&[ImportPreviewRow]> {
        match &self.state {
            ImportState::Previewed { rows, .. } => Some(rows),
            _ => None,
        }
    }

    /// 选择文件：丢弃已有预览，等待重新解析
    pub fn select_file(&mut self, file: ImportFile) {
        info!("📁 已选择导入文件: {}", file.name());
        self.generation += 1;
        self.state = ImportState::Idle { file: Some(file) };
    }

    /// 开始解析当前文件
    pub fn begin_parse(&mut self) -> Result<ParseTicket, ImportError> {
        let file = match &self.state {
            ImportState::Parsing { .. } => {
                return Err(ImportError::InvalidState {
                    state: self.state.name(),
                    action: "parse",
                })
            }
            other => other.file().cloned().ok_or(ImportError::InvalidState {
                state: "Idle",
                action: "parse",
            })?,
        };

        self.generation += 1;
        self.state = ImportState::Parsing { file: file.clone() };
        info!("🔍 正在解析: {}", file.name());
        Ok(ParseTicket {
            generation: self.generation,
            file,
        })
    }

    /// 解析完成；过期的结果（期间换了文件或取消了）被丢弃
    pub fn finish_parse(
        &mut self,
        ticket: ParseTicket,
        result: Result<Vec<ImportPreviewRow>, ImportError>,
    ) -> ParseApplied {
        let current = ticket.generation == self.generation
            && matches!(&self.state, ImportState::Parsing { file } if *file == ticket.file);
        if !current {
            debug!("丢弃过期的解析结果: {}", ticket.file.name());
            return ParseApplied::Stale;
        }

        self.state = match result {
            Ok(rows) => {
                info!("✓ 解析完成: {} 行待确认", rows.len());
                ImportState::Previewed {
                    file: ticket.file,
                    rows,
                }
            }
            Err(e) => {
                warn!("⚠️ 解析失败: {}", e);
                ImportState::Failed {
                    file: ticket.file,
                    cause: e.to_string(),
                }
            }
        };
        ParseApplied::Applied(self.state.phase())
    }

    /// 确认导入：整批转换为题目；任一行失败则整批不生效，预览保留
    pub fn confirm(&mut self, ids: &dyn IdGenerator) -> Result<ImportSummary, ImportError> {
        let summary = self.prepare_merge(ids)?;
        self.mark_merged(summary.new_questions_created);
        Ok(summary)
    }

    /// 只做转换不改变状态，合并目标写入成功后再调用 `mark_merged`
    pub fn prepare_merge(&self, ids: &dyn IdGenerator) -> Result<ImportSummary, ImportError> {
        let rows = self.preview().ok_or(ImportError::InvalidState {
            state: self.state.name(),
            action: "confirm",
        })?;

        let questions = rows_to_questions(rows, ids)?;
        Ok(ImportSummary {
            total_rows_parsed: rows.len(),
            new_questions_created: questions.len(),
            questions,
        })
    }

    /// 合并完成：清空预览，回到 Idle
    pub fn mark_merged(&mut self, merged: usize) {
        self.generation += 1;
        self.state = ImportState::Idle { file: None };
        info!("✓ 确认导入 {} 道题目", merged);
    }

    /// 取消：丢弃文件与预览
    pub fn cancel(&mut self) {
        if self.phase() != ImportPhase::Idle || self.state.file().is_some() {
            info!("已取消导入");
        }
        self.generation += 1;
        self.state = ImportState::Idle { file: None };
    }
}

/// 读取并解析导入文件
pub async fn parse_file(path: &Path) -> Result<Vec<ImportPreviewRow>, ImportError> {
    load_preview_rows(path).await
}

/// 把所有预览行转换为题目，任一行失败整体失败
pub fn rows_to_questions(
    rows: &[ImportPreviewRow],
    ids: &dyn IdGenerator,
) -> Result<Vec<Question>, ImportError> {
    if let Some(first) = rows.first() {
        if text_of(first).is_none() && !rows.iter().any(|r| text_of(r).is_some()) {
            return Err(ImportError::MissingColumn {
                column: "Question Text".to_string(),
            });
        }
    }
    rows.iter()
        .enumerate()
        .map(|(idx, row)| row_to_question(row, idx + 1, ids))
        .collect()
}

const TEXT_COLUMNS: &[&str] = &["Question Text", "Question", "Title", "Text"];

fn text_of(row: &ImportPreviewRow) -> Option<&str> {
    TEXT_COLUMNS.iter().find_map(|c| row.get(c))
}

fn option_column() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*option\s*([a-z])\s*$").ok())
        .as_ref()
}

fn correct_marker() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*\((correct|✓)\)\s*$").ok())
        .as_ref()
}

/// 把一行预览数据转换为题目
///
/// 列约定：`Question Text`、`Subject`、`Type`、`Complexity`、`Option A`…`Option Z`
/// （值以 `(Correct)` 结尾表示正确选项）、`Answer`、`Tags`、`Max Score`。
pub fn row_to_question(
    row: &ImportPreviewRow,
    row_number: usize,
    ids: &dyn IdGenerator,
) -> Result<Question, ImportError> {
    let invalid = |reason: String| ImportError::InvalidRow {
        row: row_number,
        reason,
    };

    let text = text_of(row).ok_or_else(|| invalid("缺少题干".to_string()))?;

    let tags: Vec<String> = row
        .get("Tags")
        .map(|t| {
            t.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let subject = row
        .get("Subject")
        .map(String::from)
        .or_else(|| tags.first().cloned())
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

    let mut options: Vec<QuestionOption> = row
        .cells()
        .iter()
        .filter_map(|(column, value)| {
            let letter = option_column()?.captures(column)?.get(1)?.as_str().to_lowercase();
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            let marker = correct_marker()?;
            let correct = marker.is_match(value);
            let text = marker.replace(value, "").trim().to_string();
            Some(QuestionOption::new(letter, text, correct))
        })
        .collect();

    let kind = match row.get("Type") {
        Some(label) => QuestionType::find(label)
            .ok_or_else(|| invalid(format!("未知题型: {}", label)))?,
        None if options.is_empty() => QuestionType::Essay,
        None => QuestionType::MultipleChoice,
    };

    let complexity = match row.get("Complexity").or_else(|| row.get("Difficulty")) {
        Some(label) => Complexity::find(label)
            .ok_or_else(|| invalid(format!("未知难度: {}", label)))?,
        None => Complexity::Medium,
    };

    let max_score = match row.get("Max Score") {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| invalid(format!("分值不是整数: {}", raw)))?,
        None => 1,
    };

    let answer = row.get("Answer");
    let mut expected_answer = None;

    if kind == QuestionType::TrueFalse && options.is_empty() {
        options = vec![
            QuestionOption::new("a", "True", false),
            QuestionOption::new("b", "False", false),
        ];
        if let Some(a) = answer {
            match a.to_ascii_lowercase().as_str() {
                "true" | "t" => options[0].correct = true,
                "false" | "f" => options[1].correct = true,
                _ => {}
            }
        }
    }

    match (kind.uses_options(), answer) {
        (true, Some(answer)) => {
            for letter in answer
                .split(|c: char| c == ',' || c.is_whitespace())
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                let letter = letter.to_lowercase();
                if letter == "true" || letter == "false" || letter == "t" || letter == "f" {
                    continue;
                }
                let option = options
                    .iter_mut()
                    .find(|o| o.id == letter)
                    .ok_or_else(|| invalid(format!("答案 {} 不在选项中", letter.to_uppercase())))?;
                option.correct = true;
            }
        }
        (false, Some(answer)) => expected_answer = Some(answer.to_string()),
        _ => {}
    }

    let mut question = Question::new(ids.next_id(), text, subject, kind, complexity)
        .with_options(options)
        .with_tags(tags);
    question.expected_answer = expected_answer;
    question.max_score = max_score;

    question.validate().map_err(|e| invalid(e.to_string()))?;
    Ok(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::id_gen::MonotonicIds;

    fn telephone() -> ImportPreviewRow {
        ImportPreviewRow::new()
            .with("Question Text", "Who invented the telephone?")
            .with("Subject", "History")
            .with("Type", "MCQ")
            .with("Option A", "Edison")
            .with("Option B", "Bell (Correct)")
            .with("Option C", "Tesla")
            .with("Complexity", "Easy")
    }

    fn planet() -> ImportPreviewRow {
        ImportPreviewRow::new()
            .with("Question Text", "What is the largest planet in our solar system?")
            .with("Subject", "Astronomy")
            .with("Type", "MCQ")
            .with("Option A", "Saturn")
            .with("Option B", "Jupiter (Correct)")
            .with("Option C", "Mars")
            .with("Complexity", "Medium")
    }

    fn previewed(rows: Vec<ImportPreviewRow>) -> ImportReconciler {
        let mut importer = ImportReconciler::new();
        importer.select_file(ImportFile::new("bank.csv"));
        let ticket = importer.begin_parse().unwrap();
        assert_eq!(
            importer.finish_parse(ticket, Ok(rows)),
            ParseApplied::Applied(ImportPhase::Previewed)
        );
        importer
    }

    #[test]
    fn marked_options_become_the_answer_key() {
        let ids = MonotonicIds::default();
        let question = row_to_question(&telephone(), 1, &ids).unwrap();
        assert_eq!(question.kind, QuestionType::MultipleChoice);
        assert_eq!(question.complexity, Complexity::Easy);
        assert_eq!(question.subject, "History");
        assert_eq!(question.options.len(), 3);
        assert_eq!(question.options[1].text, "Bell");
        assert_eq!(question.answer_key(), vec!["b"]);
    }

    #[test]
    fn answer_column_marks_options() {
        let ids = MonotonicIds::default();
        let row = ImportPreviewRow::new()
            .with("Question Text", "Pick the primes")
            .with("Type", "multiple_choice")
            .with("Option A", "2")
            .with("Option B", "4")
            .with("Option C", "5")
            .with("Answer", "A, C")
            .with("Tags", "Math, Basic");
        let question = row_to_question(&row, 1, &ids).unwrap();
        assert_eq!(question.answer_key(), vec!["a", "c"]);
        assert_eq!(question.subject, "Math");
        assert_eq!(question.tags, vec!["Math", "Basic"]);
    }

    #[test]
    fn essay_and_fill_in_rows_carry_no_options() {
        let ids = MonotonicIds::default();
        let essay = ImportPreviewRow::new()
            .with("Question Text", "Describe gravity.")
            .with("Type", "text")
            .with("Max Score", "10");
        let question = row_to_question(&essay, 1, &ids).unwrap();
        assert_eq!(question.kind, QuestionType::Essay);
        assert!(question.options.is_empty());
        assert_eq!(question.max_score, 10);
        assert_eq!(question.subject, DEFAULT_SUBJECT);

        let fill = ImportPreviewRow::new()
            .with("Question Text", "The chemical symbol for gold is ___")
            .with("Type", "Fill in the blank")
            .with("Answer", "Au");
        let question = row_to_question(&fill, 2, &ids).unwrap();
        assert_eq!(question.expected_answer.as_deref(), Some("Au"));
    }

    #[test]
    fn true_false_rows_get_generated_options() {
        let ids = MonotonicIds::default();
        let row = ImportPreviewRow::new()
            .with("Question Text", "The sun is a star.")
            .with("Type", "True/False")
            .with("Answer", "true");
        let question = row_to_question(&row, 1, &ids).unwrap();
        assert_eq!(question.answer_key(), vec!["a"]);
    }

    #[test]
    fn bad_rows_report_their_position() {
        let ids = MonotonicIds::default();
        let no_answer = ImportPreviewRow::new()
            .with("Question Text", "Which?")
            .with("Option A", "x")
            .with("Option B", "y");
        assert!(matches!(
            row_to_question(&no_answer, 4, &ids),
            Err(ImportError::InvalidRow { row: 4, .. })
        ));

        let unknown_type = telephone().with("Type", "Riddle");
        assert!(row_to_question(&unknown_type, 1, &ids).is_err());

        let wrong_letter = telephone().with("Answer", "D");
        assert!(row_to_question(&wrong_letter, 1, &ids).is_err());
    }

    #[test]
    fn two_row_import_confirms_two_questions() {
        let ids = MonotonicIds::default();
        let mut importer = previewed(vec![telephone(), planet()]);
        let summary = importer.confirm(&ids).unwrap();
        assert_eq!(summary.total_rows_parsed, 2);
        assert_eq!(summary.new_questions_created, 2);
        assert_eq!(summary.questions.len(), 2);
        assert_eq!(importer.phase(), ImportPhase::Idle);
        assert!(importer.state().file().is_none());
    }

    #[test]
    fn zero_rows_preview_confirms_nothing() {
        let ids = MonotonicIds::default();
        let mut importer = previewed(Vec::new());
        assert_eq!(importer.preview().map(|r| r.len()), Some(0));
        assert_eq!(importer.confirm(&ids).unwrap().new_questions_created, 0);
    }

    #[test]
    fn failing_row_rejects_the_whole_batch() {
        let ids = MonotonicIds::default();
        let broken = ImportPreviewRow::new().with("Subject", "History");
        let mut importer = previewed(vec![telephone(), broken]);
        assert!(importer.confirm(&ids).is_err());
        assert_eq!(importer.phase(), ImportPhase::Previewed);
        assert_eq!(importer.preview().map(|r| r.len()), Some(2));
    }

    #[test]
    fn missing_text_column_everywhere_is_reported() {
        let ids = MonotonicIds::default();
        let rows = vec![ImportPreviewRow::new().with("Subject", "Geo")];
        assert_eq!(
            rows_to_questions(&rows, &ids),
            Err(ImportError::MissingColumn {
                column: "Question Text".into()
            })
        );
    }

    #[test]
    fn cancel_discards_preview() {
        let mut importer = previewed(vec![telephone()]);
        importer.cancel();
        assert_eq!(importer.state(), &ImportState::Idle { file: None });
        assert!(importer.preview().is_none());
    }

    #[test]
    fn parse_failure_is_terminal_with_cause() {
        let mut importer = ImportReconciler::new();
        importer.select_file(ImportFile::new("bank.xlsx"));
        let ticket = importer.begin_parse().unwrap();
        let err = ImportError::UnsupportedFileType {
            file_name: "bank.xlsx".into(),
        };
        importer.finish_parse(ticket, Err(err));
        match importer.state() {
            ImportState::Failed { cause, .. } => assert!(cause.contains("bank.xlsx")),
            other => panic!("unexpected state: {:?}", other),
        }
        assert!(importer.preview().is_none());
    }

    #[test]
    fn superseded_parse_result_is_discarded() {
        let mut importer = ImportReconciler::new();
        importer.select_file(ImportFile::new("old.csv"));
        let stale = importer.begin_parse().unwrap();

        importer.select_file(ImportFile::new("new.csv"));
        assert_eq!(importer.finish_parse(stale.clone(), Ok(vec![telephone()])), ParseApplied::Stale);
        assert_eq!(importer.phase(), ImportPhase::Idle);

        let fresh = importer.begin_parse().unwrap();
        importer.cancel();
        assert_eq!(importer.finish_parse(fresh, Ok(vec![planet()])), ParseApplied::Stale);
        assert_eq!(importer.state(), &ImportState::Idle { file: None });
    }

    #[test]
    fn parse_needs_a_file_and_confirm_needs_a_preview() {
        let ids = MonotonicIds::default();
        let mut importer = ImportReconciler::new();
        assert!(importer.begin_parse().is_err());
        assert!(importer.confirm(&ids).is_err());

        importer.select_file(ImportFile::new("bank.csv"));
        importer.begin_parse().unwrap();
        assert!(importer.begin_parse().is_err());
    }

    #[tokio::test]
    async fn parses_real_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.csv");
        tokio::fs::write(
            &path,
            "Question Text,Subject,Type,Option A,Option B,Option C,Complexity\n\
             Who invented the telephone?,History,MCQ,Edison,Bell (Correct),Tesla,Easy\n\
             What is the largest planet in our solar system?,Astronomy,MCQ,Saturn,Jupiter (Correct),Mars,Medium\n",
        )
        .await
        .unwrap();

        let mut importer = ImportReconciler::new();
        importer.select_file(ImportFile::new(&path));
        let ticket = importer.begin_parse().unwrap();
        let result = ticket.parse().await;
        importer.finish_parse(ticket, result);

        let rows = importer.preview().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("Subject"), Some("Astronomy"));
    }

    #[tokio::test]
    async fn missing_file_fails_to_parse() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_file(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, ImportError::Unreadable { .. }));
    }
}
