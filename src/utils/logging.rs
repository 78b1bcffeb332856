/// 日志工具模块
///
/// 初始化 tracing 订阅者，并提供启动 / 统计信息的输出函数
use anyhow::{Context, Result};
use std::fs;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::workflow::LedgerStats;

/// 初始化日志订阅者
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 `debug` 或 `info`。
/// 重复初始化（例如多个测试）时静默忽略。
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// 初始化运行日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n考试控制台运行日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 考试控制台启动");
    info!("🌐 服务地址: {}", config.api_base_url);
    info!(
        "🔑 访问令牌: {}",
        if config.has_token() { "已配置" } else { "未配置（远程请求已禁用）" }
    );
    if let Some(path) = &config.import_file {
        info!("📁 待导入文件: {}", path.display());
    }
    info!("{}", "=".repeat(60));
}

/// 记录远程数据加载结果
///
/// # 参数
/// - `questions`: 题目数量
/// - `exams`: 考试数量
pub fn log_remote_loaded(questions: usize, exams: usize) {
    info!("✓ 已加载 {} 道题目、{} 场考试", questions, exams);
}

/// 打印最终统计信息
///
/// # 参数
/// - `questions`: 题库中的题目数
/// - `exams`: 考试数
/// - `stats`: 远程变更统计
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(questions: usize, exams: usize, stats: &LedgerStats, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 运行统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📚 题目: {}", questions);
    info!("📝 考试: {}", exams);
    info!("✅ 已确认变更: {}", stats.committed);
    info!("❌ 失败变更: {}", stats.failed);
    info!("⏳ 未定案变更: {}", stats.pending);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
