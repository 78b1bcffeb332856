//! 组卷器 - 业务能力层
//!
//! 维护正在编辑的考试草稿（元数据 + 有序的已选题目），
//! 所有变化都通过 `ComposerAction` 经由 `ComposerState::apply` 完成。

use tracing::{error, info, warn};

use crate::models::{Exam, ExamStatus, Question, QuestionId};
use crate::services::catalog::{self, Catalog, ALL_SUBJECTS};
use crate::services::id_gen::IdGenerator;

/// 新草稿的默认时长（分钟）
pub const DEFAULT_DURATION: u32 = 60;

/// 可编辑的草稿字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Duration,
    StartTime,
    EndTime,
}

impl DraftField {
    /// 按表单字段名查找
    pub fn find(name: &str) -> Option<Self> {
        match name {
            "title" => Some(DraftField::Title),
            "duration" => Some(DraftField::Duration),
            "startTime" | "start_time" => Some(DraftField::StartTime),
            "endTime" | "end_time" => Some(DraftField::EndTime),
            _ => None,
        }
    }
}

/// 考试草稿
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamDraft {
    pub title: String,
    pub duration: u32,
    pub start_time: String,
    pub end_time: String,
    /// 按用户选择顺序保存
    pub question_ids: Vec<QuestionId>,
}

impl Default for ExamDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            duration: DEFAULT_DURATION,
            start_time: String::new(),
            end_time: String::new(),
            question_ids: Vec::new(),
        }
    }
}

/// 组卷动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerAction {
    Open,
    Close,
    SetSearch(String),
    SetSubject(String),
    ToggleSelection(QuestionId),
    UpdateField(DraftField, String),
    Commit,
}

/// 提交被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitRejection {
    EmptySelection,
    InvalidDuration,
    UnknownQuestions(Vec<QuestionId>),
}

impl std::fmt::Display for CommitRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitRejection::EmptySelection => write!(f, "至少需要选择一道题目"),
            CommitRejection::InvalidDuration => write!(f, "考试时长必须是正整数"),
            CommitRejection::UnknownQuestions(ids) => {
                write!(f, "题库中不存在这些题目: {}", ids.join(", "))
            }
        }
    }
}

/// 动作结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerOutcome {
    /// 状态已更新
    Updated,
    /// 草稿已提交，生成新的考试
    Committed(Exam),
    /// 提交被阻止，表单保持打开
    Rejected(CommitRejection),
}

/// 组卷器状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerState {
    pub is_open: bool,
    pub draft: ExamDraft,
    pub search: String,
    pub subject: String,
}

impl Default for ComposerState {
    fn default() -> Self {
        Self {
            is_open: false,
            draft: ExamDraft::default(),
            search: String::new(),
            subject: ALL_SUBJECTS.to_string(),
        }
    }
}

impl ComposerState {
    /// 状态转移函数
    ///
    /// 除 `Commit` 需要 ID 生成器外不依赖任何外部状态。
    pub fn apply(
        &mut self,
        action: ComposerAction,
        catalog: &Catalog,
        ids: &dyn IdGenerator,
    ) -> ComposerOutcome {
        let outcome = match action {
            ComposerAction::Open => {
                self.is_open = true;
                ComposerOutcome::Updated
            }
            ComposerAction::Close => {
                self.is_open = false;
                ComposerOutcome::Updated
            }
            ComposerAction::SetSearch(search) => {
                self.search = search;
                ComposerOutcome::Updated
            }
            ComposerAction::SetSubject(subject) => {
                self.subject = subject;
                ComposerOutcome::Updated
            }
            ComposerAction::ToggleSelection(id) => {
                self.toggle_selection(id);
                ComposerOutcome::Updated
            }
            ComposerAction::UpdateField(field, value) => {
                self.update_field(field, value);
                ComposerOutcome::Updated
            }
            ComposerAction::Commit => self.commit(catalog, ids),
        };

        self.check_disjoint(catalog);
        outcome
    }

    fn toggle_selection(&mut self, id: QuestionId) {
        let selected = &mut self.draft.question_ids;
        match selected.iter().position(|q| *q == id) {
            Some(index) => {
                selected.remove(index);
            }
            None => selected.push(id),
        }
    }

    fn update_field(&mut self, field: DraftField, value: String) {
        match field {
            DraftField::Title => self.draft.title = value,
            DraftField::Duration => self.draft.duration = coerce_duration(&value),
            DraftField::StartTime => self.draft.start_time = value,
            DraftField::EndTime => self.draft.end_time = value,
        }
    }

    fn commit(&mut self, catalog: &Catalog, ids: &dyn IdGenerator) -> ComposerOutcome {
        if self.draft.question_ids.is_empty() {
            warn!("⚠️ 未选择任何题目，无法创建考试");
            return ComposerOutcome::Rejected(CommitRejection::EmptySelection);
        }
        if self.draft.duration == 0 {
            warn!("⚠️ 考试时长无效，无法创建考试");
            return ComposerOutcome::Rejected(CommitRejection::InvalidDuration);
        }
        let unknown: Vec<QuestionId> = self
            .draft
            .question_ids
            .iter()
            .filter(|id| !catalog.contains(id))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            warn!("⚠️ 草稿引用了不存在的题目: {:?}", unknown);
            return ComposerOutcome::Rejected(CommitRejection::UnknownQuestions(unknown));
        }

        let draft = std::mem::take(&mut self.draft);
        let exam = Exam {
            id: ids.next_id(),
            title: draft.title,
            duration: draft.duration,
            start_time: draft.start_time,
            end_time: draft.end_time,
            status: ExamStatus::Draft,
            total_questions: draft.question_ids.len(),
            question_ids: draft.question_ids,
        };
        self.is_open = false;

        info!(
            "✓ 考试 \"{}\" 已创建为草稿 (ID: {}, 共 {} 题)",
            exam.title, exam.id, exam.total_questions
        );
        ComposerOutcome::Committed(exam)
    }

    /// 可选题目：筛选结果去掉已选题目，保持题库顺序
    pub fn available<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Question> {
        catalog::filter(catalog.questions(), &self.subject, &self.search)
            .into_iter()
            .filter(|q| !self.is_selected(&q.id))
            .collect()
    }

    /// 已选题目，按选择顺序；题库中已不存在的 ID 被跳过
    pub fn selected<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Question> {
        self.draft
            .question_ids
            .iter()
            .filter_map(|id| catalog.get(id))
            .collect()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.draft.question_ids.iter().any(|q| q == id)
    }

    fn check_disjoint(&self, catalog: &Catalog) {
        let overlap = self
            .available(catalog)
            .iter()
            .any(|q| self.is_selected(&q.id));
        if overlap {
            error!("❌ 可选题目与已选题目出现重叠");
        }
        debug_assert!(!overlap, "available and selected views must be disjoint");
    }
}

/// 时长按整数前缀解析，无法解析或为负数时为 0
fn coerce_duration(raw: &str) -> u32 {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let prefix: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    if negative || prefix.is_empty() {
        return 0;
    }
    prefix.parse().unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Complexity, QuestionType};
    use crate::services::id_gen::MonotonicIds;

    fn catalog() -> Catalog {
        Catalog::new(vec![
            Question::new("Q1", "capital of France", "Geo", QuestionType::Essay, Complexity::Easy),
            Question::new("Q2", "2+2", "Math", QuestionType::Essay, Complexity::Easy),
            Question::new("Q3", "capital of Spain", "Geo", QuestionType::Essay, Complexity::Easy),
        ])
    }

    fn ids_of(questions: &[&Question]) -> Vec<String> {
        questions.iter().map(|q| q.id.clone()).collect()
    }

    #[test]
    fn double_toggle_restores_selection() {
        let catalog = catalog();
        let ids = MonotonicIds::default();
        let mut state = ComposerState::default();
        state.apply(ComposerAction::ToggleSelection("Q2".into()), &catalog, &ids);
        let before = state.clone();

        for id in ["Q1", "Q2", "Q3"] {
            state.apply(ComposerAction::ToggleSelection(id.into()), &catalog, &ids);
            state.apply(ComposerAction::ToggleSelection(id.into()), &catalog, &ids);
            assert_eq!(state, before);
        }
    }

    #[test]
    fn available_and_selected_stay_disjoint() {
        let catalog = catalog();
        let ids = MonotonicIds::default();
        let mut state = ComposerState::default();
        for id in ["Q3", "Q1", "Q3", "Q2", "Q1"] {
            state.apply(ComposerAction::ToggleSelection(id.into()), &catalog, &ids);
            let available = ids_of(&state.available(&catalog));
            let selected = ids_of(&state.selected(&catalog));
            assert!(available.iter().all(|a| !selected.contains(a)));
            assert_eq!(available.len() + selected.len(), catalog.len());
        }
    }

    #[test]
    fn selected_view_keeps_selection_order() {
        let catalog = catalog();
        let ids = MonotonicIds::default();
        let mut state = ComposerState::default();
        state.apply(ComposerAction::ToggleSelection("Q3".into()), &catalog, &ids);
        state.apply(ComposerAction::ToggleSelection("Q1".into()), &catalog, &ids);
        assert_eq!(ids_of(&state.selected(&catalog)), vec!["Q3", "Q1"]);
    }

    #[test]
    fn available_respects_search_and_subject() {
        let catalog = catalog();
        let ids = MonotonicIds::default();
        let mut state = ComposerState::default();
        state.apply(ComposerAction::SetSearch("CAPITAL".into()), &catalog, &ids);
        state.apply(ComposerAction::ToggleSelection("Q1".into()), &catalog, &ids);
        assert_eq!(ids_of(&state.available(&catalog)), vec!["Q3"]);

        state.apply(ComposerAction::SetSubject("Math".into()), &catalog, &ids);
        assert!(state.available(&catalog).is_empty());
    }

    #[test]
    fn duration_is_coerced_like_an_integer_prefix() {
        assert_eq!(coerce_duration("45"), 45);
        assert_eq!(coerce_duration(" 90min"), 90);
        assert_eq!(coerce_duration("abc"), 0);
        assert_eq!(coerce_duration(""), 0);
        assert_eq!(coerce_duration("-5"), 0);
        assert_eq!(coerce_duration("+15"), 15);
    }

    #[test]
    fn other_fields_are_stored_verbatim() {
        let catalog = catalog();
        let ids = MonotonicIds::default();
        let mut state = ComposerState::default();
        state.apply(
            ComposerAction::UpdateField(DraftField::StartTime, " not a date ".into()),
            &catalog,
            &ids,
        );
        state.apply(ComposerAction::UpdateField(DraftField::Title, "  Quiz ".into()), &catalog, &ids);
        assert_eq!(state.draft.start_time, " not a date ");
        assert_eq!(state.draft.title, "  Quiz ");
        assert_eq!(DraftField::find("startTime"), Some(DraftField::StartTime));
    }

    #[test]
    fn empty_commit_is_rejected_and_form_stays_open() {
        let catalog = catalog();
        let ids = MonotonicIds::default();
        let mut state = ComposerState::default();
        state.apply(ComposerAction::Open, &catalog, &ids);
        let outcome = state.apply(ComposerAction::Commit, &catalog, &ids);
        assert_eq!(outcome, ComposerOutcome::Rejected(CommitRejection::EmptySelection));
        assert!(state.is_open);
    }

    #[test]
    fn zero_duration_commit_is_rejected() {
        let catalog = catalog();
        let ids = MonotonicIds::default();
        let mut state = ComposerState::default();
        state.apply(ComposerAction::ToggleSelection("Q1".into()), &catalog, &ids);
        state.apply(ComposerAction::UpdateField(DraftField::Duration, "soon".into()), &catalog, &ids);
        let outcome = state.apply(ComposerAction::Commit, &catalog, &ids);
        assert_eq!(outcome, ComposerOutcome::Rejected(CommitRejection::InvalidDuration));
        assert_eq!(state.draft.question_ids, vec!["Q1".to_string()]);
    }

    #[test]
    fn commit_rejects_questions_missing_from_catalog() {
        let catalog = catalog();
        let ids = MonotonicIds::default();
        let mut state = ComposerState::default();
        state.apply(ComposerAction::ToggleSelection("Q9".into()), &catalog, &ids);
        let outcome = state.apply(ComposerAction::Commit, &catalog, &ids);
        assert_eq!(
            outcome,
            ComposerOutcome::Rejected(CommitRejection::UnknownQuestions(vec!["Q9".into()]))
        );
    }

    #[test]
    fn commit_builds_draft_exam_and_clears_state() {
        let catalog = catalog();
        let ids = MonotonicIds::new("exam");
        let mut state = ComposerState::default();
        state.apply(ComposerAction::Open, &catalog, &ids);
        state.apply(ComposerAction::UpdateField(DraftField::Title, "Quiz1".into()), &catalog, &ids);
        state.apply(ComposerAction::UpdateField(DraftField::Duration, "30".into()), &catalog, &ids);
        state.apply(ComposerAction::ToggleSelection("Q1".into()), &catalog, &ids);

        let exam = match state.apply(ComposerAction::Commit, &catalog, &ids) {
            ComposerOutcome::Committed(exam) => exam,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(exam.id, "exam-1");
        assert_eq!(exam.title, "Quiz1");
        assert_eq!(exam.duration, 30);
        assert_eq!(exam.total_questions, 1);
        assert_eq!(exam.status, ExamStatus::Draft);
        assert_eq!(exam.question_ids, vec!["Q1".to_string()]);

        assert!(!state.is_open);
        assert_eq!(state.draft, ExamDraft::default());
    }

    #[test]
    fn back_to_back_commits_get_distinct_ids() {
        let catalog = catalog();
        let ids = MonotonicIds::default();
        let mut state = ComposerState::default();
        let mut created = Vec::new();
        for _ in 0..2 {
            state.apply(ComposerAction::ToggleSelection("Q2".into()), &catalog, &ids);
            if let ComposerOutcome::Committed(exam) = state.apply(ComposerAction::Commit, &catalog, &ids) {
                created.push(exam.id);
            }
        }
        assert_eq!(created.len(), 2);
        assert_ne!(created[0], created[1]);
    }
}
