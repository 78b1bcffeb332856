//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责调度远程调用和本地状态，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `console_app` - 控制台应用
//! - 管理应用生命周期（初始化、运行、统计）
//! - 唯一持有远程服务客户端和状态仓库
//!
//! ### `sync` - 远程同步
//! - 并发加载题库与考试列表
//! - 驱动导入流程
//! - 逐笔执行并定案待确认的变更
//!
//! ## 层次关系
//!
//! ```text
//! console_app
//!     ↓
//! sync ──────────→ clients (ExamBackend)
//!     ↓
//! workflow::ConsoleStore (命令 / 事件 / 台账)
//!     ↓
//! services (catalog / composer / lifecycle / importer / inspector)
//! ```

pub mod console_app;
pub mod sync;

pub use console_app::App;
