/// 考试服务 API 客户端
///
/// 唯一持有 HTTP 连接的模块。没有访问令牌时不发出任何请求。
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::clients::wire::{
    CurrentUser, ExamCreate, ExamOut, ExamUpdate, ImportSummaryOut, QuestionCreate, QuestionOut,
};
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{Exam, Question};
use crate::services::catalog::QuestionFilter;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// 远程考试服务
///
/// 编排层只依赖这个 trait，测试时可以换成内存实现。
#[async_trait]
pub trait ExamBackend: Send + Sync {
    async fn current_user(&self) -> Result<CurrentUser, ApiError>;
    async fn list_exams(&self) -> Result<Vec<Exam>, ApiError>;
    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, ApiError>;
    async fn get_question(&self, id: &str) -> Result<Question, ApiError>;
    async fn create_exam(&self, exam: &Exam) -> Result<Exam, ApiError>;
    async fn update_exam(&self, exam_id: &str, update: &ExamUpdate) -> Result<Exam, ApiError>;
    async fn create_question(&self, question: &Question) -> Result<Question, ApiError>;
    async fn import_questions(&self, path: &Path) -> Result<ImportSummaryOut, ApiError>;
}

/// 考试服务客户端
pub struct ExamApiClient {
    http: Client,
    base_url: String,
    token: String,
    max_retries: usize,
}

impl ExamApiClient {
    /// 创建新的客户端
    ///
    /// # 参数
    /// - `config`: 提供服务地址、令牌、超时与重试次数
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::RequestFailed {
                endpoint: config.api_base_url.clone(),
                source: Box::new(e),
            })?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.access_token.clone(),
            max_retries: config.max_retries,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// 发送请求并解析 JSON，频率限制和服务端错误会按退避重试
    ///
    /// # 参数
    /// - `endpoint`: 接口路径，用于拼接地址和错误信息
    /// - `build`: 每次重试都重新构建请求（multipart 请求体不能复用）
    async fn send_json<T, F>(&self, endpoint: &str, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&Client, String) -> RequestBuilder,
    {
        if self.token.trim().is_empty() {
            return Err(ApiError::MissingToken {
                endpoint: endpoint.to_string(),
            });
        }

        let mut attempt = 0;
        loop {
            let request = build(&self.http, self.url(endpoint)).bearer_auth(&self.token);
            match self.send_once(endpoint, request).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = match &e {
                        ApiError::RateLimited {
                            retry_after: Some(secs),
                            ..
                        } => Duration::from_secs(*secs),
                        _ => backoff_delay(attempt),
                    };
                    attempt += 1;
                    warn!(
                        "⚠️ {} 请求失败，{:?} 后重试 ({}/{}): {}",
                        endpoint, delay, attempt, self.max_retries, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::RequestFailed {
            endpoint: endpoint.to_string(),
            source: Box::new(e),
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ApiError::RateLimited {
                endpoint: endpoint.to_string(),
                retry_after,
            });
        }

        let body = response.text().await.map_err(|e| ApiError::RequestFailed {
            endpoint: endpoint.to_string(),
            source: Box::new(e),
        })?;
        debug!("{} → {} {}", endpoint, status.as_u16(), crate::utils::logging::truncate_text(&body, 200));

        if !status.is_success() {
            return Err(ApiError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::JsonParseFailed {
            source: Box::new(e),
        })
    }
}

/// 指数退避：500ms 起步，每次翻倍，最多等待 30 秒
fn backoff_delay(attempt: usize) -> Duration {
    let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
    let millis = 500u64.saturating_mul(2u64.saturating_pow(exponent));
    Duration::from_millis(millis).min(MAX_BACKOFF)
}

/// FastAPI 风格的错误体：`{"detail": "..."}` 或 `{"detail": [{"msg": ...}]}`
fn error_detail(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    match parsed.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|i| i.get("msg").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; "),
        ),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl ExamBackend for ExamApiClient {
    async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        self.send_json("/auth/current-user/", |http, url| http.get(url))
            .await
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, ApiError> {
        let exams: Vec<ExamOut> = self
            .send_json("/exam/available-exam", |http, url| http.get(url))
            .await?;
        Ok(exams.into_iter().map(Exam::from).collect())
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, ApiError> {
        let query = filter.to_query_pairs();
        let questions: Vec<QuestionOut> = self
            .send_json("/exam/all-questions", |http, url| http.get(url).query(&query))
            .await?;

        Ok(questions
            .into_iter()
            .filter_map(|out| {
                let id = out.id.clone();
                match out.into_question() {
                    Ok(q) => Some(q),
                    Err(reason) => {
                        warn!("⚠️ 跳过无法识别的题目 {}: {}", id, reason);
                        None
                    }
                }
            })
            .collect())
    }

    async fn get_question(&self, id: &str) -> Result<Question, ApiError> {
        let endpoint = format!("/exam/view-question/{}", id);
        let out: QuestionOut = self.send_json(&endpoint, |http, url| http.get(url)).await?;
        out.into_question()
            .map_err(|reason| ApiError::InvalidPayload { endpoint, reason })
    }

    async fn create_exam(&self, exam: &Exam) -> Result<Exam, ApiError> {
        let endpoint = "/exam/create-exam";
        let body = ExamCreate::try_from(exam).map_err(|reason| ApiError::InvalidPayload {
            endpoint: endpoint.to_string(),
            reason,
        })?;
        let out: ExamOut = self
            .send_json(endpoint, |http, url| http.post(url).json(&body))
            .await?;
        Ok(out.into())
    }

    async fn update_exam(&self, exam_id: &str, update: &ExamUpdate) -> Result<Exam, ApiError> {
        let endpoint = format!("/exam/update-exam/{}", exam_id);
        let out: ExamOut = self
            .send_json(&endpoint, |http, url| http.patch(url).json(update))
            .await?;
        Ok(out.into())
    }

    async fn create_question(&self, question: &Question) -> Result<Question, ApiError> {
        let endpoint = "/exam/create-question";
        let body = QuestionCreate::from(question);
        let out: QuestionOut = self
            .send_json(endpoint, |http, url| http.post(url).json(&body))
            .await?;
        out.into_question().map_err(|reason| ApiError::InvalidPayload {
            endpoint: endpoint.to_string(),
            reason,
        })
    }

    async fn import_questions(&self, path: &Path) -> Result<ImportSummaryOut, ApiError> {
        let endpoint = "/exam/import-excel";
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::InvalidPayload {
                endpoint: endpoint.to_string(),
                reason: format!("无法读取 {}: {}", path.display(), e),
            })?;
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        self.send_json(endpoint, |http, url| {
            let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
            http.post(url).multipart(Form::new().part("file", part))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_token_sends_nothing() {
        let config = Config {
            api_base_url: "http://127.0.0.1:9".into(),
            access_token: String::new(),
            ..Default::default()
        };
        let client = ExamApiClient::new(&config).unwrap();
        let err = client.list_exams().await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken { .. }));
        let err = client
            .list_questions(&QuestionFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingToken { .. }));
    }

    #[test]
    fn error_detail_reads_fastapi_bodies() {
        assert_eq!(
            error_detail(r#"{"detail": "Exam not found."}"#).as_deref(),
            Some("Exam not found.")
        );
        assert_eq!(
            error_detail(r#"{"detail": [{"msg": "field required"}, {"msg": "bad time"}]}"#).as_deref(),
            Some("field required; bad time")
        );
        assert_eq!(error_detail("<html>"), None);
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(6), Duration::from_secs(30));
        assert_eq!(backoff_delay(64), Duration::from_secs(30));
        assert_eq!(backoff_delay(usize::MAX), Duration::from_secs(30));
    }

    #[test]
    fn base_url_is_normalized() {
        let config = Config {
            api_base_url: "http://localhost:8000/api/v1/".into(),
            ..Default::default()
        };
        let client = ExamApiClient::new(&config).unwrap();
        assert_eq!(client.url("/exam/create-exam"), "http://localhost:8000/api/v1/exam/create-exam");
    }

    #[tokio::test]
    #[ignore] // 需要运行中的考试服务和有效令牌
    async fn live_current_user() {
        let config = Config::load().unwrap();
        let client = ExamApiClient::new(&config).unwrap();
        let user = client.current_user().await.unwrap();
        println!("当前用户: {:?}", user);
    }
}
