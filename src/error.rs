use thiserror::Error;

/// 应用程序错误类型
///
/// 远程变更失败时，编排层把各类错误统一收敛到这里再写入台账。
#[derive(Debug, Error)]
pub enum AppError {
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 导入流程错误
    #[error("导入错误: {0}")]
    Import(#[from] ImportError),
    /// 业务逻辑错误
    #[error("业务错误: {0}")]
    Business(#[from] BusinessError),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 没有访问令牌，所有查询被禁用
    #[error("缺少访问令牌，已禁用请求 ({endpoint})")]
    MissingToken { endpoint: String },
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): status={status}, detail={detail:?}")]
    BadResponse {
        endpoint: String,
        status: u16,
        detail: Option<String>,
    },
    /// 请求频率限制
    #[error("API请求频率限制 ({endpoint}), 建议等待: {retry_after:?}秒")]
    RateLimited {
        endpoint: String,
        retry_after: Option<u64>,
    },
    /// 本地记录无法转换为请求体
    #[error("请求数据无效 ({endpoint}): {reason}")]
    InvalidPayload { endpoint: String, reason: String },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApiError {
    /// 是否值得重试（频率限制或服务端错误）
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } => true,
            ApiError::BadResponse { status, .. } => *status >= 500,
            ApiError::RequestFailed { .. } => true,
            _ => false,
        }
    }
}

/// 导入流程错误
///
/// 解析失败会以人类可读的原因进入 `Failed` 状态，确认失败则整批回退。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// 不支持的文件类型
    #[error("不支持的文件类型: {file_name} (仅支持 .csv / .json / .toml)")]
    UnsupportedFileType { file_name: String },
    /// 读取文件失败
    #[error("无法读取文件 {file_name}: {reason}")]
    Unreadable { file_name: String, reason: String },
    /// 文件格式错误
    #[error("文件格式错误 ({file_name}) 第 {line} 行: {reason}")]
    Malformed {
        file_name: String,
        line: usize,
        reason: String,
    },
    /// 缺少必需的列
    #[error("缺少必需的列: {column}")]
    MissingColumn { column: String },
    /// 某一行无法转换为题目
    #[error("第 {row} 行无法转换为题目: {reason}")]
    InvalidRow { row: usize, reason: String },
    /// 服务端拒绝了导入文件
    #[error("服务端拒绝导入 {file_name}: {reason}")]
    Rejected { file_name: String, reason: String },
    /// 当前状态不允许此操作
    #[error("当前导入状态 {state} 不允许操作: {action}")]
    InvalidState {
        state: &'static str,
        action: &'static str,
    },
}

/// 业务逻辑错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusinessError {
    /// 题目ID重复
    #[error("题目ID重复: {id}")]
    DuplicateQuestionId { id: String },
    /// 题目不存在
    #[error("题目不存在: {id}")]
    QuestionNotFound { id: String },
    /// 考试不存在
    #[error("考试不存在: {id}")]
    ExamNotFound { id: String },
    /// 题目数据不合法
    #[error("题目数据不合法: {reason}")]
    InvalidQuestion { reason: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取或解析失败
    #[error("配置文件 {path} 无效: {reason}")]
    InvalidFile { path: String, reason: String },
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_only_for_transient_failures() {
        let rate_limited = ApiError::RateLimited {
            endpoint: "/exam/create-exam".into(),
            retry_after: Some(2),
        };
        let server = ApiError::BadResponse {
            endpoint: "/exam/create-exam".into(),
            status: 503,
            detail: None,
        };
        let client = ApiError::BadResponse {
            endpoint: "/exam/create-exam".into(),
            status: 422,
            detail: Some("duration_minutes".into()),
        };
        let missing = ApiError::MissingToken {
            endpoint: "/exam/all-questions".into(),
        };

        assert!(rate_limited.is_retryable());
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!missing.is_retryable());
    }

    #[test]
    fn nested_errors_convert_into_app_error() {
        let err: AppError = ImportError::MissingColumn {
            column: "Question Text".into(),
        }
        .into();
        assert!(matches!(err, AppError::Import(_)));
        assert!(err.to_string().contains("Question Text"));

        let err: AppError = ApiError::BadResponse {
            endpoint: "/exam/create-exam".into(),
            status: 400,
            detail: Some("Start time must be before end time.".into()),
        }
        .into();
        assert!(err.to_string().contains("400"));

        let err: AppError = BusinessError::ExamNotFound { id: "local-3".into() }.into();
        assert_eq!(err.to_string(), "业务错误: 考试不存在: local-3");
    }
}
