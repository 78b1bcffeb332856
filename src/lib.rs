//! # Exam Console
//!
//! 考试管理控制台：维护题库、组卷、发布考试、批量导入题目，
//! 并与远程考试服务同步
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 唯一持有 HTTP 连接，只暴露远程能力
//! - `ExamApiClient` - 考试服务客户端（令牌、超时、重试）
//! - `ExamBackend` - 远程服务抽象，测试时可替换
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，纯状态转移，不做 IO
//! - `catalog` - 题库筛选
//! - `composer` - 组卷状态机
//! - `lifecycle` - 发布切换与发布前检查
//! - `importer` - 导入状态机
//! - `inspector` - 题目详情
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 唯一的状态仓库
//! - `ConsoleStore` - 命令进、事件出
//! - `MutationLedger` - 远程变更的 Pending / Committed / Failed
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/console_app` - 应用生命周期
//! - `orchestrator/sync` - 远程加载、导入、定案
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ExamApiClient, ExamBackend};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Exam, ExamStatus, ImportPreviewRow, Question};
pub use orchestrator::App;
pub use workflow::{Command, ConsoleStore, DispatchOutcome, StoreEvent};
