//! 控制台状态仓库 - 流程层
//!
//! 唯一的写入者：所有状态变化都经由 `dispatch(Command)`，
//! 观察者通过 `subscribe()` 收到 `StoreEvent`。
//!
//! 需要远程确认的命令会在台账中登记一笔 Pending 变更，
//! 编排层调用远程接口后用 `Command::SettleMutation` 定案。

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::{BusinessError, ImportError};
use crate::models::{Exam, ExamId, ImportPreviewRow, Question, QuestionId};
use crate::services::catalog::Catalog;
use crate::services::composer::{CommitRejection, ComposerAction, ComposerOutcome, ComposerState};
use crate::services::id_gen::IdGenerator;
use crate::services::importer::{
    ImportFile, ImportPhase, ImportReconciler, ParseApplied, ParseTicket,
};
use crate::services::inspector::{inspect, QuestionDetail};
use crate::services::lifecycle::{publish_warnings, toggle_publish, PublishWarning};
use crate::workflow::ledger::{
    MutationId, MutationKind, MutationLedger, MutationState, Settlement,
};

const EVENT_CAPACITY: usize = 64;

/// 命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 新建题目；ID 为空时由本地生成
    AddQuestion(Question),
    /// 删除第一步：请求删除，等待确认
    RequestDeleteQuestion(QuestionId),
    /// 删除第二步：确认
    ConfirmDeleteQuestion,
    CancelDeleteQuestion,
    /// 组卷器的其他动作（打开、筛选、修改字段）
    Composer(ComposerAction),
    ToggleSelection(QuestionId),
    CreateExam,
    TogglePublish(ExamId),
    SelectImportFile(ImportFile),
    /// 开始解析已选文件，结果里带回解析凭据
    ParseImport,
    /// 解析完成（可能已过期）
    ImportParsed {
        ticket: ParseTicket,
        result: Result<Vec<ImportPreviewRow>, ImportError>,
    },
    ConfirmImport,
    CancelImport,
    /// 用远程数据替换题库
    ReplaceCatalog(Vec<Question>),
    /// 用远程数据替换考试列表
    ReplaceExams(Vec<Exam>),
    /// 用远程最新数据覆盖单道题目
    RefreshQuestion(Question),
    SettleMutation {
        id: MutationId,
        settlement: Settlement,
    },
}

/// 命令被拒绝的原因；这些都是预期内的校验失败，不是错误
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Commit(CommitRejection),
    PublishBlocked(Vec<PublishWarning>),
    Import(ImportError),
    Catalog(BusinessError),
    UnknownQuestion(QuestionId),
    UnknownExam(ExamId),
    NoPendingDelete,
    UnknownMutation(MutationId),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Commit(r) => write!(f, "{}", r),
            Rejection::PublishBlocked(warnings) => {
                let reasons: Vec<String> = warnings.iter().map(|w| w.to_string()).collect();
                write!(f, "发布被阻止: {}", reasons.join("; "))
            }
            Rejection::Import(e) => write!(f, "{}", e),
            Rejection::Catalog(e) => write!(f, "{}", e),
            Rejection::UnknownQuestion(id) => write!(f, "题目不存在: {}", id),
            Rejection::UnknownExam(id) => write!(f, "考试不存在: {}", id),
            Rejection::NoPendingDelete => write!(f, "没有待确认的删除"),
            Rejection::UnknownMutation(id) => write!(f, "变更 #{} 不存在或已定案", id),
        }
    }
}

/// 命令结果
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Updated,
    /// 没有任何变化（例如过期的解析结果）
    Unchanged,
    Rejected(Rejection),
    ParseStarted(ParseTicket),
    /// 本地已生效，等待远程确认
    MutationIssued(MutationId),
    /// 导入已并入题库，`merged` 为新增题目数
    Imported { mutation: MutationId, merged: usize },
}

/// 通知给观察者的事件
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    CatalogChanged { total: usize },
    ExamsChanged { total: usize },
    ComposerChanged,
    ImportChanged(ImportPhase),
    DeleteRequested(QuestionId),
    MutationIssued { id: MutationId, kind: &'static str },
    MutationSettled { id: MutationId, state: MutationState },
}

/// 控制台状态仓库
pub struct ConsoleStore {
    catalog: Catalog,
    exams: Vec<Exam>,
    composer: ComposerState,
    importer: ImportReconciler,
    pending_delete: Option<QuestionId>,
    ledger: MutationLedger,
    ids: Arc<dyn IdGenerator>,
    strict_publish: bool,
    events: broadcast::Sender<StoreEvent>,
}

impl ConsoleStore {
    /// 创建空仓库
    ///
    /// # 参数
    /// - `ids`: 本地 ID 生成器（考试、题目共用）
    /// - `strict_publish`: 发布前检查有问题时是否拦截
    pub fn new(ids: Arc<dyn IdGenerator>, strict_publish: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            catalog: Catalog::default(),
            exams: Vec::new(),
            composer: ComposerState::default(),
            importer: ImportReconciler::new(),
            pending_delete: None,
            ledger: MutationLedger::new(),
            ids,
            strict_publish,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn exams(&self) -> &[Exam] {
        &self.exams
    }

    pub fn exam(&self, id: &str) -> Option<&Exam> {
        self.exams.iter().find(|e| e.id == id)
    }

    pub fn composer(&self) -> &ComposerState {
        &self.composer
    }

    pub fn importer(&self) -> &ImportReconciler {
        &self.importer
    }

    pub fn ledger(&self) -> &MutationLedger {
        &self.ledger
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn available(&self) -> Vec<&Question> {
        self.composer.available(&self.catalog)
    }

    pub fn selected(&self) -> Vec<&Question> {
        self.composer.selected(&self.catalog)
    }

    pub fn subjects(&self) -> Vec<String> {
        self.catalog.distinct_subjects()
    }

    pub fn inspect(&self, question_id: &str) -> Option<QuestionDetail> {
        self.catalog.get(question_id).map(inspect)
    }

    /// 执行命令
    pub fn dispatch(&mut self, command: Command) -> DispatchOutcome {
        debug!("dispatch: {:?}", command);
        let outcome = match command {
            Command::AddQuestion(question) => self.add_question(question),
            Command::RequestDeleteQuestion(id) => self.request_delete(id),
            Command::ConfirmDeleteQuestion => self.confirm_delete(),
            Command::CancelDeleteQuestion => {
                if let Some(id) = self.pending_delete.take() {
                    info!("已取消删除题目 {}", id);
                }
                DispatchOutcome::Updated
            }
            Command::Composer(action) => self.compose(action),
            Command::ToggleSelection(id) => self.compose(ComposerAction::ToggleSelection(id)),
            Command::CreateExam => self.compose(ComposerAction::Commit),
            Command::TogglePublish(exam_id) => self.toggle_publish(exam_id),
            Command::SelectImportFile(file) => {
                self.importer.select_file(file);
                self.emit(StoreEvent::ImportChanged(self.importer.phase()));
                DispatchOutcome::Updated
            }
            Command::ParseImport => match self.importer.begin_parse() {
                Ok(ticket) => {
                    self.emit(StoreEvent::ImportChanged(ImportPhase::Parsing));
                    DispatchOutcome::ParseStarted(ticket)
                }
                Err(e) => DispatchOutcome::Rejected(Rejection::Import(e)),
            },
            Command::ImportParsed { ticket, result } => {
                match self.importer.finish_parse(ticket, result) {
                    ParseApplied::Applied(phase) => {
                        self.emit(StoreEvent::ImportChanged(phase));
                        DispatchOutcome::Updated
                    }
                    ParseApplied::Stale => DispatchOutcome::Unchanged,
                }
            }
            Command::ConfirmImport => self.confirm_import(),
            Command::CancelImport => {
                self.importer.cancel();
                self.emit(StoreEvent::ImportChanged(ImportPhase::Idle));
                DispatchOutcome::Updated
            }
            Command::ReplaceCatalog(questions) => {
                self.catalog.replace_all(questions);
                self.emit_catalog();
                self.audit_exam_consistency();
                DispatchOutcome::Updated
            }
            Command::ReplaceExams(exams) => {
                self.exams = exams;
                self.emit_exams();
                self.audit_exam_consistency();
                DispatchOutcome::Updated
            }
            Command::RefreshQuestion(question) => {
                let id = question.id.clone();
                if self.catalog.refresh(question) {
                    self.emit_catalog();
                    DispatchOutcome::Updated
                } else {
                    DispatchOutcome::Rejected(Rejection::UnknownQuestion(id))
                }
            }
            Command::SettleMutation { id, settlement } => self.settle(id, settlement),
        };

        if let DispatchOutcome::Rejected(reason) = &outcome {
            warn!("⚠️ 命令被拒绝: {}", reason);
        }
        outcome
    }

    // ========== 题库 ==========

    fn add_question(&mut self, mut question: Question) -> DispatchOutcome {
        if question.id.trim().is_empty() {
            question.id = self.ids.next_id();
        }
        let question_id = question.id.clone();
        if let Err(e) = self.catalog.append_batch(vec![question]) {
            return DispatchOutcome::Rejected(Rejection::Catalog(e));
        }

        info!("✓ 已添加题目 {}", question_id);
        self.emit_catalog();
        self.issue(MutationKind::CreateQuestion { question_id })
    }

    fn request_delete(&mut self, id: QuestionId) -> DispatchOutcome {
        if !self.catalog.contains(&id) {
            return DispatchOutcome::Rejected(Rejection::UnknownQuestion(id));
        }
        info!("🗑️ 请求删除题目 {}，等待确认", id);
        self.pending_delete = Some(id.clone());
        self.emit(StoreEvent::DeleteRequested(id));
        DispatchOutcome::Updated
    }

    fn confirm_delete(&mut self) -> DispatchOutcome {
        let Some(id) = self.pending_delete.take() else {
            return DispatchOutcome::Rejected(Rejection::NoPendingDelete);
        };
        if self.catalog.remove(&id).is_none() {
            return DispatchOutcome::Rejected(Rejection::UnknownQuestion(id));
        }

        info!("✓ 已删除题目 {}", id);
        self.deselect(&id);
        self.emit_catalog();
        self.audit_exam_consistency();
        DispatchOutcome::Updated
    }

    // ========== 组卷与发布 ==========

    fn compose(&mut self, action: ComposerAction) -> DispatchOutcome {
        match self.composer.apply(action, &self.catalog, self.ids.as_ref()) {
            ComposerOutcome::Updated => {
                self.emit(StoreEvent::ComposerChanged);
                DispatchOutcome::Updated
            }
            ComposerOutcome::Rejected(reason) => DispatchOutcome::Rejected(Rejection::Commit(reason)),
            ComposerOutcome::Committed(exam) => {
                let exam_id = exam.id.clone();
                self.exams.push(exam);
                self.emit(StoreEvent::ComposerChanged);
                self.emit_exams();
                self.issue(MutationKind::CreateExam { exam_id })
            }
        }
    }

    fn toggle_publish(&mut self, exam_id: ExamId) -> DispatchOutcome {
        let Some(exam) = self.exam(&exam_id) else {
            return DispatchOutcome::Rejected(Rejection::UnknownExam(exam_id));
        };

        if !exam.is_published() {
            let warnings = publish_warnings(exam, &self.catalog);
            for warning in &warnings {
                warn!("⚠️ 考试 \"{}\" 发布前检查: {}", exam.title, warning);
            }
            if self.strict_publish && !warnings.is_empty() {
                return DispatchOutcome::Rejected(Rejection::PublishBlocked(warnings));
            }
        }

        let Some(previous) = toggle_publish(&mut self.exams, &exam_id) else {
            return DispatchOutcome::Rejected(Rejection::UnknownExam(exam_id));
        };
        info!("✓ 考试 {} 状态: {} → {}", exam_id, previous, previous.toggled());
        self.emit_exams();
        self.issue(MutationKind::UpdateExamStatus { exam_id, previous })
    }

    // ========== 导入 ==========

    fn confirm_import(&mut self) -> DispatchOutcome {
        let summary = match self.importer.prepare_merge(self.ids.as_ref()) {
            Ok(summary) => summary,
            Err(e) => return DispatchOutcome::Rejected(Rejection::Import(e)),
        };
        let Some(file) = self.importer.state().file().cloned() else {
            return DispatchOutcome::Rejected(Rejection::Import(ImportError::InvalidState {
                state: "Idle",
                action: "confirm",
            }));
        };

        let question_ids: Vec<QuestionId> = summary.questions.iter().map(|q| q.id.clone()).collect();
        if let Err(e) = self.catalog.append_batch(summary.questions) {
            return DispatchOutcome::Rejected(Rejection::Catalog(e));
        }

        info!(
            "📥 导入完成: 解析 {} 行，新增 {} 道题目",
            summary.total_rows_parsed, summary.new_questions_created
        );
        let merged = summary.new_questions_created;
        self.importer.mark_merged(merged);
        self.emit(StoreEvent::ImportChanged(ImportPhase::Idle));
        self.emit_catalog();
        match self.issue(MutationKind::ImportQuestions { file, question_ids }) {
            DispatchOutcome::MutationIssued(mutation) => DispatchOutcome::Imported { mutation, merged },
            other => other,
        }
    }

    // ========== 远程变更 ==========

    fn issue(&mut self, kind: MutationKind) -> DispatchOutcome {
        let name = kind.name();
        let id = self.ledger.record(kind);
        debug!("变更 #{} ({}) 等待远程确认", id, name);
        self.emit(StoreEvent::MutationIssued { id, kind: name });
        DispatchOutcome::MutationIssued(id)
    }

    fn settle(&mut self, id: MutationId, settlement: Settlement) -> DispatchOutcome {
        let Some(record) = self.ledger.settle(id, &settlement) else {
            return DispatchOutcome::Rejected(Rejection::UnknownMutation(id));
        };

        match settlement {
            Settlement::Committed { server_ids } => {
                info!("✓ 变更 #{} ({}) 已确认", id, record.kind.name());
                self.rebind(&record.kind, &server_ids);
            }
            Settlement::Failed(reason) => {
                error!("❌ 变更 #{} ({}) 失败: {}，回滚本地修改", id, record.kind.name(), reason);
                self.rollback(&record.kind);
            }
        }

        self.emit(StoreEvent::MutationSettled {
            id,
            state: record.state,
        });
        DispatchOutcome::Updated
    }

    /// 用服务端 ID 替换本地 ID
    fn rebind(&mut self, kind: &MutationKind, server_ids: &[String]) {
        match kind {
            MutationKind::CreateExam { exam_id } => {
                let Some(server_id) = server_ids.first() else {
                    return;
                };
                if let Some(exam) = self.exams.iter_mut().find(|e| e.id == *exam_id) {
                    exam.id = server_id.clone();
                    self.ledger.rebind_exam(exam_id, server_id);
                    self.emit_exams();
                }
            }
            MutationKind::CreateQuestion { question_id } => {
                if let Some(server_id) = server_ids.first() {
                    self.rebind_question(question_id, server_id);
                }
            }
            MutationKind::ImportQuestions { question_ids, .. } => {
                if server_ids.len() == question_ids.len() {
                    for (local, server) in question_ids.iter().zip(server_ids) {
                        self.rebind_question(local, server);
                    }
                }
            }
            MutationKind::UpdateExamStatus { .. } => {}
        }
    }

    fn rebind_question(&mut self, local_id: &str, server_id: &str) {
        if !self.catalog.rebind_id(local_id, server_id) {
            return;
        }
        for exam in &mut self.exams {
            for id in exam.question_ids.iter_mut().filter(|id| *id == local_id) {
                *id = server_id.to_string();
            }
        }
        if self.composer.is_selected(local_id) {
            for id in self
                .composer
                .draft
                .question_ids
                .iter_mut()
                .filter(|id| *id == local_id)
            {
                *id = server_id.to_string();
            }
        }
        if self.pending_delete.as_deref() == Some(local_id) {
            self.pending_delete = Some(server_id.to_string());
        }
        self.ledger.rebind_question(local_id, server_id);
        self.emit_catalog();
    }

    /// 撤销失败变更的本地效果
    fn rollback(&mut self, kind: &MutationKind) {
        match kind {
            MutationKind::CreateExam { exam_id } => {
                self.exams.retain(|e| e.id != *exam_id);
                self.emit_exams();
            }
            MutationKind::UpdateExamStatus { exam_id, previous } => {
                if let Some(exam) = self.exams.iter_mut().find(|e| e.id == *exam_id) {
                    exam.status = *previous;
                    self.emit_exams();
                }
            }
            MutationKind::CreateQuestion { question_id } => {
                self.drop_question(question_id);
                self.emit_catalog();
                self.audit_exam_consistency();
            }
            MutationKind::ImportQuestions { question_ids, .. } => {
                for id in question_ids {
                    self.drop_question(id);
                }
                self.emit_catalog();
                self.audit_exam_consistency();
            }
        }
    }

    fn drop_question(&mut self, id: &str) {
        self.catalog.remove(id);
        self.deselect(id);
        if self.pending_delete.as_deref() == Some(id) {
            self.pending_delete = None;
        }
    }

    fn deselect(&mut self, id: &str) {
        if self.composer.is_selected(id) {
            self.composer
                .apply(ComposerAction::ToggleSelection(id.to_string()), &self.catalog, self.ids.as_ref());
            self.emit(StoreEvent::ComposerChanged);
        }
    }

    // ========== 一致性检查 ==========

    /// 检查考试是否引用了已不存在的题目、题目数快照是否过期
    ///
    /// 只记录日志，不修正数据。返回有问题的考试数量。
    pub fn audit_exam_consistency(&self) -> usize {
        let mut inconsistent = 0;
        for exam in &self.exams {
            let dangling = exam
                .question_ids
                .iter()
                .filter(|id| !self.catalog.contains(id))
                .count();
            let actual = exam.question_ids.len() - dangling;
            if dangling > 0 || actual != exam.total_questions {
                inconsistent += 1;
                warn!(
                    "⚠️ 考试 \"{}\" ({}) 题目数快照 {}，当前可用 {}，缺失 {}",
                    exam.title, exam.id, exam.total_questions, actual, dangling
                );
            }
        }
        inconsistent
    }

    fn emit(&self, event: StoreEvent) {
        // 没有订阅者时发送失败，忽略即可
        let _ = self.events.send(event);
    }

    fn emit_catalog(&self) {
        self.emit(StoreEvent::CatalogChanged {
            total: self.catalog.len(),
        });
    }

    fn emit_exams(&self) {
        self.emit(StoreEvent::ExamsChanged {
            total: self.exams.len(),
        });
    }
}
