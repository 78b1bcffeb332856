//! 控制台应用 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、HTTP 客户端、状态仓库
//! 2. **远程加载**：题库与考试列表
//! 3. **导入**：处理配置中指定的导入文件
//! 4. **定案**：把本地变更提交到远程服务
//! 5. **查看**：从远程刷新指定题目并输出详情
//! 6. **统计**：输出运行结果
//!
//! 没有访问令牌时只做本地处理，变更保持 Pending。

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::clients::{ExamApiClient, ExamBackend};
use crate::config::Config;
use crate::orchestrator::sync;
use crate::services::id_gen;
use crate::services::inspector::inspect;
use crate::utils::logging::{init_log_file, log_remote_loaded, log_startup, print_final_stats};
use crate::workflow::{ConsoleStore, DispatchOutcome, LedgerStats};

/// 应用主结构
pub struct App<B: ExamBackend = ExamApiClient> {
    config: Config,
    backend: B,
    store: ConsoleStore,
}

impl App<ExamApiClient> {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config);

        let backend = ExamApiClient::new(&config).context("无法创建 HTTP 客户端")?;
        Ok(Self::with_backend(config, backend))
    }
}

impl<B: ExamBackend> App<B> {
    /// 使用指定的远程服务创建应用
    pub fn with_backend(config: Config, backend: B) -> Self {
        let store = ConsoleStore::new(id_gen::from_strategy(config.id_strategy), config.strict_publish);
        Self {
            config,
            backend,
            store,
        }
    }

    pub fn store(&self) -> &ConsoleStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConsoleStore {
        &mut self.store
    }

    /// 运行应用主逻辑
    pub async fn run(&mut self) -> Result<LedgerStats> {
        let online = self.config.has_token();

        if online {
            let user = self
                .backend
                .current_user()
                .await
                .context("无法获取当前用户")?;
            info!("👤 当前用户: {} ({})", user.email, user.role.as_deref().unwrap_or("unknown"));
            if !user.is_admin() {
                warn!("⚠️ 当前用户不是管理员，创建和导入可能被拒绝");
            }

            let (questions, exams) = sync::load_remote(&mut self.store, &self.backend).await?;
            log_remote_loaded(questions, exams);
        } else {
            warn!("⚠️ 未配置访问令牌，跳过远程加载与同步");
        }

        if let Some(path) = self.config.import_file.clone() {
            info!("\n📁 正在导入: {}", path.display());
            let outcome = sync::import_file(&mut self.store, &path).await?;
            if matches!(outcome, DispatchOutcome::Imported { .. }) && self.config.verbose_logging {
                self.log_catalog();
            }
        }

        let stats = if online {
            sync::settle_pending(&mut self.store, &self.backend).await
        } else {
            self.store.ledger().stats()
        };

        if let Some(question_id) = self.config.inspect_question.clone() {
            if online {
                match sync::inspect_remote(&mut self.store, &self.backend, &question_id).await {
                    Ok(detail) => info!("\n{}", detail),
                    Err(e) => warn!("⚠️ 无法获取题目 {}: {}", question_id, e),
                }
            } else {
                match self.store.inspect(&question_id) {
                    Some(detail) => info!("\n{}", detail),
                    None => warn!("⚠️ 本地题库中没有题目 {}", question_id),
                }
            }
        }

        print_final_stats(
            self.store.catalog().len(),
            self.store.exams().len(),
            &stats,
            &self.config.output_log_file,
        );
        Ok(stats)
    }

    /// 详细模式下输出题库中每道题的详情
    fn log_catalog(&self) {
        for question in self.store.catalog().questions() {
            info!("\n{}", inspect(question));
        }
    }
}
