use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigError;

/// ID 生成策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// UUID v4
    Uuid,
    /// 进程内单调递增计数器
    Monotonic,
}

impl IdStrategy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "uuid" => Some(IdStrategy::Uuid),
            "monotonic" | "counter" => Some(IdStrategy::Monotonic),
            _ => None,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 考试 API 配置 ---
    pub api_base_url: String,
    /// 访问令牌；为空时所有远程查询被禁用
    pub access_token: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 频率限制或服务端错误时的最大重试次数
    pub max_retries: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 启动时要导入的题目文件（可选）
    pub import_file: Option<PathBuf>,
    /// 启动时从远程刷新并输出详情的题目 ID（可选）
    pub inspect_question: Option<String>,
    /// 发布前是否强制检查（题目为空、时间窗口倒置等）
    pub strict_publish: bool,
    pub id_strategy: IdStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            access_token: String::new(),
            request_timeout_secs: 30,
            max_retries: 3,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            import_file: None,
            inspect_question: None,
            strict_publish: false,
            id_strategy: IdStrategy::Uuid,
        }
    }
}

impl Config {
    /// 先读取 `EXAM_CONSOLE_CONFIG` 指向的 TOML 文件（如果有），再用环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("EXAM_CONSOLE_CONFIG") {
            Ok(path) => Self::from_toml_file(&path)?,
            Err(_) => Self::default(),
        };
        base.with_env_overrides()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn from_toml_str(content: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFile {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn from_toml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFile {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content, path)
    }

    fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// 用变量查找函数覆盖各字段，测试中可以注入假的环境
    pub fn apply_overrides(
        self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = self;
        if let Some(v) = var("EXAM_API_BASE_URL") {
            config.api_base_url = v;
        }
        if let Some(v) = lookup("EXAM_ACCESS_TOKEN") {
            config.access_token = v.trim().to_string();
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", &v, "u64")?;
        }
        if let Some(v) = var("MAX_RETRIES") {
            config.max_retries = parse_var("MAX_RETRIES", &v, "usize")?;
        }
        if let Some(v) = var("VERBOSE_LOGGING") {
            config.verbose_logging = parse_var("VERBOSE_LOGGING", &v, "bool")?;
        }
        if let Some(v) = var("OUTPUT_LOG_FILE") {
            config.output_log_file = v;
        }
        if let Some(v) = var("IMPORT_FILE") {
            config.import_file = Some(PathBuf::from(v));
        }
        if let Some(v) = var("INSPECT_QUESTION") {
            config.inspect_question = Some(v);
        }
        if let Some(v) = var("STRICT_PUBLISH") {
            config.strict_publish = parse_var("STRICT_PUBLISH", &v, "bool")?;
        }
        if let Some(v) = var("ID_STRATEGY") {
            config.id_strategy =
                IdStrategy::parse(&v).ok_or_else(|| ConfigError::EnvVarParseFailed {
                    var_name: "ID_STRATEGY".to_string(),
                    value: v.clone(),
                    expected_type: "uuid|monotonic".to_string(),
                })?;
        }
        Ok(config)
    }

    /// 是否持有访问令牌
    pub fn has_token(&self) -> bool {
        !self.access_token.is_empty()
    }
}

fn parse_var<T: std::str::FromStr>(
    var_name: &str,
    value: &str,
    expected_type: &str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::EnvVarParseFailed {
        var_name: var_name.to_string(),
        value: value.to_string(),
        expected_type: expected_type.to_string(),
    })
}
