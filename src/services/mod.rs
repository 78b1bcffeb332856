//! 业务能力层（Capability Layer）
//!
//! 每个模块只负责一件事，不持有网络资源，不关心调用顺序。
//!
//! - `catalog`：题库与筛选
//! - `composer`：组卷状态机
//! - `lifecycle`：发布状态切换与发布前检查
//! - `importer`：导入状态机与行→题目转换
//! - `inspector`：题目详情投影
//! - `id_gen`：本地 ID 生成

pub mod catalog;
pub mod composer;
pub mod id_gen;
pub mod importer;
pub mod inspector;
pub mod lifecycle;

pub use catalog::{Catalog, QuestionFilter, ALL_SUBJECTS};
pub use composer::{CommitRejection, ComposerAction, ComposerOutcome, ComposerState, DraftField};
pub use id_gen::{IdGenerator, MonotonicIds, UuidIds};
pub use importer::{
    ImportFile, ImportPhase, ImportReconciler, ImportState, ImportSummary, ParseApplied,
    ParseTicket,
};
pub use inspector::{inspect, QuestionDetail};
pub use lifecycle::{publish_warnings, toggle_publish, PublishWarning};
