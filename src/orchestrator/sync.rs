//! 远程同步 - 编排层
//!
//! 把仓库里的状态和远程考试服务对齐：
//! 1. 加载题库和考试列表
//! 2. 驱动导入流程（选择 → 解析 → 确认）
//! 3. 逐笔执行待确认的变更并定案
//! 4. 从远程刷新单道题目并输出详情

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Result};
use tracing::{debug, error, info, warn};

use crate::clients::{ExamBackend, ExamUpdate};
use crate::error::{ApiError, AppResult, BusinessError, ImportError};
use crate::models::{ExamStatus, Question, QuestionId};
use crate::services::catalog::QuestionFilter;
use crate::services::importer::{ImportFile, ImportState};
use crate::services::inspector::{inspect, QuestionDetail};
use crate::workflow::{
    Command, ConsoleStore, DispatchOutcome, LedgerStats, MutationKind, MutationRecord, Settlement,
};

/// 并发加载题库和考试列表，整体替换仓库中的数据
///
/// # 返回
/// 返回 (题目数, 考试数)
pub async fn load_remote<B: ExamBackend + ?Sized>(
    store: &mut ConsoleStore,
    backend: &B,
) -> Result<(usize, usize), ApiError> {
    info!("\n📡 正在加载题库和考试列表...");
    let filter = QuestionFilter::default();
    let (questions, exams) =
        futures::try_join!(backend.list_questions(&filter), backend.list_exams())?;

    let counts = (questions.len(), exams.len());
    store.dispatch(Command::ReplaceCatalog(questions));
    store.dispatch(Command::ReplaceExams(exams));
    Ok(counts)
}

/// 导入一个本地文件：选择、解析、确认
///
/// 解析失败时返回错误并保留 Failed 状态；确认被拒绝时预览保留。
pub async fn import_file(store: &mut ConsoleStore, path: &Path) -> Result<DispatchOutcome> {
    store.dispatch(Command::SelectImportFile(ImportFile::new(path)));

    let ticket = match store.dispatch(Command::ParseImport) {
        DispatchOutcome::ParseStarted(ticket) => ticket,
        other => bail!("无法开始解析 {}: {:?}", path.display(), other),
    };
    let result = ticket.parse().await;
    store.dispatch(Command::ImportParsed { ticket, result });

    if let ImportState::Failed { cause, .. } = store.importer().state() {
        bail!("导入文件解析失败: {}", cause);
    }
    if let Some(rows) = store.importer().preview() {
        info!("📋 预览: {} 行", rows.len());
    }

    let outcome = store.dispatch(Command::ConfirmImport);
    match &outcome {
        DispatchOutcome::Imported { merged, .. } => info!("✓ 已并入 {} 道题目", merged),
        DispatchOutcome::Rejected(reason) => error!("❌ 确认导入失败，预览已保留: {}", reason),
        _ => {}
    }
    Ok(outcome)
}

/// 执行所有待确认的变更
///
/// 每次只取第一笔，定案后重新读取台账：
/// 新建考试、题目或导入定案后 ID 会被替换，后续记录需要看到新 ID。
pub async fn settle_pending<B: ExamBackend + ?Sized>(
    store: &mut ConsoleStore,
    backend: &B,
) -> LedgerStats {
    while let Some(record) = store.ledger().pending().into_iter().next() {
        let settlement = match perform(store, backend, &record).await {
            Ok(server_ids) => Settlement::Committed { server_ids },
            Err(e) => {
                warn!("⚠️ 变更 #{} ({}) 未被服务端接受: {}", record.id, record.kind.name(), e);
                Settlement::Failed(e.to_string())
            }
        };
        store.dispatch(Command::SettleMutation {
            id: record.id,
            settlement,
        });
    }
    store.ledger().stats()
}

/// 对单笔变更调用对应的远程接口
///
/// # 返回
/// 服务端分配的 ID（新建类变更），其余变更返回空列表
async fn perform<B: ExamBackend + ?Sized>(
    store: &ConsoleStore,
    backend: &B,
    record: &MutationRecord,
) -> AppResult<Vec<String>> {
    match &record.kind {
        MutationKind::CreateExam { exam_id } => {
            let exam = store
                .exam(exam_id)
                .ok_or_else(|| BusinessError::ExamNotFound { id: exam_id.clone() })?;
            let created = backend.create_exam(exam).await?;
            Ok(vec![created.id])
        }
        MutationKind::UpdateExamStatus { exam_id, previous } => {
            let status: ExamStatus = store
                .exam(exam_id)
                .map(|e| e.status)
                .unwrap_or_else(|| previous.toggled());
            backend.update_exam(exam_id, &ExamUpdate::status(status)).await?;
            Ok(Vec::new())
        }
        MutationKind::CreateQuestion { question_id } => {
            let question = store.catalog().get(question_id).ok_or_else(|| {
                BusinessError::QuestionNotFound {
                    id: question_id.clone(),
                }
            })?;
            let created = backend.create_question(question).await?;
            Ok(vec![created.id])
        }
        MutationKind::ImportQuestions { file, question_ids } => {
            let summary = backend.import_questions(&file.path).await?;
            if !summary.import_successful {
                return Err(ImportError::Rejected {
                    file_name: file.name(),
                    reason: summary.errors.join("; "),
                }
                .into());
            }
            info!(
                "✓ 服务端导入完成: 解析 {} 行，新增 {} 道",
                summary.total_rows_parsed, summary.new_questions_created
            );
            for e in &summary.errors {
                warn!("⚠️ 服务端导入提示: {}", e);
            }

            // 导入接口不返回题目 ID，重新拉取题库后按题干对应
            let remote = backend.list_questions(&QuestionFilter::default()).await?;
            match_imported(store, question_ids, &remote)
        }
    }
}

/// 为本地导入的每道题找到服务端新建的同题干题目
///
/// 已在本地题库中的远程题目不参与匹配，每道远程题目最多对应一次。
fn match_imported(
    store: &ConsoleStore,
    local_ids: &[QuestionId],
    remote: &[Question],
) -> AppResult<Vec<String>> {
    let mut taken: HashSet<&str> = HashSet::new();
    let mut server_ids = Vec::with_capacity(local_ids.len());

    for local_id in local_ids {
        let not_found = || BusinessError::QuestionNotFound {
            id: local_id.clone(),
        };
        let local = store.catalog().get(local_id).ok_or_else(not_found)?;
        let server = remote
            .iter()
            .find(|q| {
                !store.catalog().contains(&q.id)
                    && !taken.contains(q.id.as_str())
                    && q.text.trim() == local.text.trim()
            })
            .ok_or_else(not_found)?;
        taken.insert(server.id.as_str());
        server_ids.push(server.id.clone());
    }
    Ok(server_ids)
}

/// 从远程获取题目的最新数据，更新本地题库并返回详情
///
/// 题目不在本地题库中时只返回详情，不写入题库。
pub async fn inspect_remote<B: ExamBackend + ?Sized>(
    store: &mut ConsoleStore,
    backend: &B,
    question_id: &str,
) -> Result<QuestionDetail, ApiError> {
    let question = backend.get_question(question_id).await?;
    let detail = inspect(&question);
    if let DispatchOutcome::Rejected(_) = store.dispatch(Command::RefreshQuestion(question)) {
        debug!("题目 {} 不在本地题库中，仅输出详情", question_id);
    }
    Ok(detail)
}
