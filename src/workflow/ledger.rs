//! 远程变更台账
//!
//! 本地先生效，远程确认后再定案：`Pending → Committed | Failed`。
//! 失败时由 store 根据记录回滚本地效果。

use std::fmt;

use crate::models::{ExamId, ExamStatus, QuestionId};
use crate::services::ImportFile;

pub type MutationId = u64;

/// 需要远程确认的变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// 新建考试（本地 ID，确认后替换为服务端 ID）
    CreateExam { exam_id: ExamId },
    /// 发布 / 取消发布
    UpdateExamStatus {
        exam_id: ExamId,
        previous: ExamStatus,
    },
    /// 新建题目
    CreateQuestion { question_id: QuestionId },
    /// 批量导入
    ImportQuestions {
        file: ImportFile,
        question_ids: Vec<QuestionId>,
    },
}

impl MutationKind {
    pub fn name(&self) -> &'static str {
        match self {
            MutationKind::CreateExam { .. } => "create-exam",
            MutationKind::UpdateExamStatus { .. } => "update-exam",
            MutationKind::CreateQuestion { .. } => "create-question",
            MutationKind::ImportQuestions { .. } => "import-questions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState {
    Pending,
    Committed,
    Failed(String),
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationState::Pending => write!(f, "pending"),
            MutationState::Committed => write!(f, "committed"),
            MutationState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub id: MutationId,
    pub kind: MutationKind,
    pub state: MutationState,
}

/// 远程调用的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// 成功；新建类变更带回服务端分配的 ID
    Committed { server_ids: Vec<String> },
    Failed(String),
}

impl Settlement {
    pub fn committed() -> Self {
        Settlement::Committed {
            server_ids: Vec::new(),
        }
    }

    pub fn committed_as(server_id: impl Into<String>) -> Self {
        Settlement::Committed {
            server_ids: vec![server_id.into()],
        }
    }
}

/// 各状态的数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub pending: usize,
    pub committed: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct MutationLedger {
    next_id: MutationId,
    records: Vec<MutationRecord>,
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一笔待确认的变更
    pub fn record(&mut self, kind: MutationKind) -> MutationId {
        self.next_id += 1;
        let id = self.next_id;
        self.records.push(MutationRecord {
            id,
            kind,
            state: MutationState::Pending,
        });
        id
    }

    pub fn get(&self, id: MutationId) -> Option<&MutationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    /// 所有待确认的变更，按登记顺序
    pub fn pending(&self) -> Vec<MutationRecord> {
        self.records
            .iter()
            .filter(|r| r.state == MutationState::Pending)
            .cloned()
            .collect()
    }

    /// 定案；只有 Pending 的记录可以定案
    pub fn settle(&mut self, id: MutationId, settlement: &Settlement) -> Option<MutationRecord> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id && r.state == MutationState::Pending)?;
        record.state = match settlement {
            Settlement::Committed { .. } => MutationState::Committed,
            Settlement::Failed(reason) => MutationState::Failed(reason.clone()),
        };
        Some(record.clone())
    }

    /// 考试拿到服务端 ID 后，同步更新仍在等待的记录
    pub fn rebind_exam(&mut self, local_id: &str, server_id: &str) {
        for record in self.pending_mut() {
            match &mut record.kind {
                MutationKind::CreateExam { exam_id }
                | MutationKind::UpdateExamStatus { exam_id, .. }
                    if exam_id == local_id =>
                {
                    *exam_id = server_id.to_string();
                }
                _ => {}
            }
        }
    }

    pub fn rebind_question(&mut self, local_id: &str, server_id: &str) {
        for record in self.pending_mut() {
            match &mut record.kind {
                MutationKind::CreateQuestion { question_id } if question_id == local_id => {
                    *question_id = server_id.to_string();
                }
                MutationKind::ImportQuestions { question_ids, .. } => {
                    for id in question_ids.iter_mut().filter(|id| *id == local_id) {
                        *id = server_id.to_string();
                    }
                }
                _ => {}
            }
        }
    }

    fn pending_mut(&mut self) -> impl Iterator<Item = &mut MutationRecord> {
        self.records
            .iter_mut()
            .filter(|r| r.state == MutationState::Pending)
    }

    pub fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats::default();
        for record in &self.records {
            match record.state {
                MutationState::Pending => stats.pending += 1,
                MutationState::Committed => stats.committed += 1,
                MutationState::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }
}
