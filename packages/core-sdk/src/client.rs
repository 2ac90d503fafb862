use std::path::Path;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{multipart, Body, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::config::{ChatStatusPolicy, ClientConfig};
use crate::error::{KmError, KmResult};
use crate::models::{
    ChatRequest, ChatResponse, CreateKnowledgeModel, Document, HealthStatus, KnowledgeModel,
    KnowledgeModelId, LanguageModel, LanguageModelInfo, Listing, Message,
};
use crate::prompt::{DEFAULT_SYSTEM_NAME, DEFAULT_SYSTEM_PROMPT};
use crate::telemetry;

/** \brief 鉴权头名称（HTTP 头不区分大小写）。 */
pub const ACCESS_KEY_HEADER: &str = "x-km-accesskey";

/**
 * \brief 单次聊天补全的可选参数。
 */
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /** \brief 系统消息正文，缺省使用内置提示 */
    pub system_content: Option<String>,
    /** \brief 系统消息的 name 字段 */
    pub system_name: String,
    /** \brief 语言模型 */
    pub model: LanguageModel,
    /** \brief 透传给服务端的 stream 标记 */
    pub stream: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            system_content: None,
            system_name: DEFAULT_SYSTEM_NAME.to_string(),
            model: LanguageModel::default(),
            stream: false,
        }
    }
}

/**
 * \brief 批量删除的结果：已删除的 ID 与失败项，均保持列表顺序。
 */
#[derive(Debug, Default)]
pub struct RemovalReport {
    pub removed: Vec<String>,
    pub failed: Vec<(String, KmError)>,
}

impl RemovalReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/**
 * \brief 知识模型服务的最小鉴权客户端。
 * \details 一个实例只绑定一个知识模型 ID，首次解析后缓存，文档与聊天操作都作用于该 ID。
 */
pub struct KnowledgeModelClient {
    config: ClientConfig,
    http: reqwest::Client,
    model_id: OnceCell<KnowledgeModelId>,
}

impl KnowledgeModelClient {
    /**
     * \brief 创建客户端，知识模型 ID 延迟到首次使用时解析。
     */
    pub fn new(config: ClientConfig) -> KmResult<Self> {
        let http = build_http_client(&config.token)?;
        Ok(Self {
            config,
            http,
            model_id: OnceCell::new(),
        })
    }

    /**
     * \brief 使用外部提供的知识模型 ID 创建客户端。
     */
    pub fn with_model_id(config: ClientConfig, id: impl Into<KnowledgeModelId>) -> KmResult<Self> {
        let http = build_http_client(&config.token)?;
        Ok(Self {
            config,
            http,
            model_id: OnceCell::new_with(Some(id.into())),
        })
    }

    /**
     * \brief 在服务端新建知识模型，并把客户端绑定到新模型。
     */
    pub async fn create(config: ClientConfig, params: &CreateKnowledgeModel) -> KmResult<Self> {
        let client = Self::new(config)?;
        let created = client.create_knowledge_model(params).await?;
        info!(model_id = %created.id, name = %created.name, "knowledge model created");
        Ok(Self {
            model_id: OnceCell::new_with(Some(created.id)),
            ..client
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /** \brief 已缓存的知识模型 ID（尚未解析时为 None）。 */
    pub fn cached_model_id(&self) -> Option<&KnowledgeModelId> {
        self.model_id.get()
    }

    /**
     * \brief 列出当前账号可见的知识模型。
     */
    pub async fn list_knowledge_models(&self) -> KmResult<Vec<KnowledgeModel>> {
        let resp = self
            .http
            .get(self.config.url("knowledge-models"))
            .send()
            .await?;
        let listing: Listing<KnowledgeModel> = read_json(resp).await?;
        debug!(count = listing.results.len(), total = ?listing.total, "listed knowledge models");
        Ok(listing.results)
    }

    /**
     * \brief 新建知识模型，返回服务端记录。
     */
    pub async fn create_knowledge_model(
        &self,
        params: &CreateKnowledgeModel,
    ) -> KmResult<KnowledgeModel> {
        let resp = self
            .http
            .post(self.config.url("knowledge-models"))
            .json(params)
            .send()
            .await?;
        read_json(resp).await
    }

    /**
     * \brief 列出服务端支持的语言模型。
     */
    pub async fn list_language_models(&self) -> KmResult<Vec<LanguageModelInfo>> {
        let resp = self
            .http
            .get(self.config.url("language_models"))
            .send()
            .await?;
        let listing: Listing<LanguageModelInfo> = read_json(resp).await?;
        Ok(listing.results)
    }

    /**
     * \brief 返回绑定的知识模型 ID；未绑定时取列表中的第一个并缓存。
     * \details 列表为空时返回 `NoModelAvailable`，后续操作均依赖该 ID。
     */
    pub async fn resolve_model_id(&self) -> KmResult<KnowledgeModelId> {
        self.model_id
            .get_or_try_init(|| async {
                let first = self
                    .list_knowledge_models()
                    .await?
                    .into_iter()
                    .next()
                    .ok_or(KmError::NoModelAvailable)?;
                info!(model_id = %first.id, "resolved knowledge model");
                Ok::<_, KmError>(first.id)
            })
            .await
            .cloned()
    }

    /**
     * \brief 存活探测；非 2xx 不报错，原样返回状态码。
     */
    pub async fn check_alive(&self) -> KmResult<HealthStatus> {
        let resp = self.http.post(self.config.url("alive")).send().await?;
        let status = resp.status();
        debug!(%status, "alive probe");
        Ok(HealthStatus { status })
    }

    /**
     * \brief 以 multipart 流式上传本地文件到当前知识模型。
     * \details 仅 200 视为成功；文件句柄随请求体一起释放，任何路径都不会泄漏。
     */
    pub async fn upload_document(&self, local_path: impl AsRef<Path>) -> KmResult<Document> {
        let path = local_path.as_ref();
        let model_id = self.resolve_model_id().await?;

        let io_err = |source: std::io::Error| KmError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let len = file.metadata().await.map_err(io_err)?.len();

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let part = multipart::Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), len)
            .file_name(file_name.clone())
            .mime_str(mime.as_ref())?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(self.config.url(&format!("knowledge-models/{}/files", model_id)))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if status != StatusCode::OK {
            warn!(%status, file = %file_name, "upload rejected");
            telemetry::log_error("client.upload", &format!("{} -> {}", file_name, status));
            return Err(KmError::UploadFailed { status, body });
        }

        let document: Document = serde_json::from_str(&body)?;
        info!(document_id = %document.id, file = %file_name, "document uploaded");
        telemetry::log_event("client.upload", &format!("{} -> {}", file_name, document.id));
        Ok(document)
    }

    /**
     * \brief 列出当前知识模型下的文档，顺序由服务端决定。
     */
    pub async fn list_documents(&self) -> KmResult<Vec<Document>> {
        let model_id = self.resolve_model_id().await?;
        let resp = self
            .http
            .get(self.config.url(&format!("knowledge-models/{}/files", model_id)))
            .send()
            .await?;
        let listing: Listing<Document> = read_json(resp).await?;
        Ok(listing.results)
    }

    /**
     * \brief 删除单个文档；服务端报错时返回非致命的 `DeleteFailed`，不重试。
     */
    pub async fn remove_document(&self, document_id: &str) -> KmResult<()> {
        let model_id = self.resolve_model_id().await?;
        let resp = self
            .http
            .delete(self.config.url(&format!(
                "knowledge-models/{}/files/{}",
                model_id, document_id
            )))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, document_id, "document removal failed");
            telemetry::log_error("client.remove", &format!("{} -> {}", document_id, status));
            return Err(KmError::DeleteFailed {
                document_id: document_id.to_string(),
                status,
            });
        }
        debug!(%status, document_id, "document removed");
        Ok(())
    }

    /**
     * \brief 先列出再逐个删除；单个失败不会中断后续删除，也没有回滚。
     */
    pub async fn remove_all_documents(&self) -> KmResult<RemovalReport> {
        let documents = self.list_documents().await?;
        let mut report = RemovalReport::default();
        for document in documents {
            match self.remove_document(&document.id).await {
                Ok(()) => report.removed.push(document.id),
                Err(err) => report.failed.push((document.id, err)),
            }
        }
        info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "bulk document removal finished"
        );
        Ok(report)
    }

    /**
     * \brief 纯函数：构造 [system, user] 两条消息，system 消息附带 name。
     */
    pub fn build_messages(user_content: &str, system_content: &str, system_name: &str) -> Vec<Message> {
        vec![
            Message::system(system_content, system_name),
            Message::user(user_content),
        ]
    }

    /**
     * \brief 发送聊天补全请求，返回未经校验的 JSON 响应。
     * \details 非 2xx 的处理由 `ChatStatusPolicy` 决定：默认报 `ChatFailed`，`AcceptAny` 时照常解析响应体。
     */
    pub async fn query(&self, user_content: &str, options: &QueryOptions) -> KmResult<ChatResponse> {
        let model_id = self.resolve_model_id().await?;
        let system_content = options
            .system_content
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let request = ChatRequest {
            model: options.model.clone(),
            messages: Self::build_messages(user_content, system_content, &options.system_name),
            stream: options.stream,
        };

        debug!(model = %request.model, prompt_len = user_content.len(), "sending chat completion");
        let resp = self
            .http
            .post(self.config.url(&format!(
                "knowledge-models/{}/chat/completions",
                model_id
            )))
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            telemetry::log_error("client.query", &format!("model={} status={}", request.model, status));
            match self.config.chat_status_policy {
                ChatStatusPolicy::RequireSuccess => {
                    return Err(KmError::ChatFailed { status, body });
                }
                ChatStatusPolicy::AcceptAny => {
                    warn!(%status, "chat completion returned error status, passing body through");
                }
            }
        } else {
            telemetry::log_event(
                "client.query",
                &format!("model={} prompt_len={}", request.model, user_content.len()),
            );
        }

        let value: Value = serde_json::from_str(&body)?;
        Ok(ChatResponse::new(value))
    }

    /**
     * \brief 从文件读取用户提示后调用 `query`。
     */
    pub async fn query_from_file(
        &self,
        path: impl AsRef<Path>,
        options: &QueryOptions,
    ) -> KmResult<ChatResponse> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| KmError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        self.query(&content, options).await
    }
}

fn build_http_client(token: &str) -> KmResult<reqwest::Client> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| KmError::Config(format!("invalid access token: {}", e)))?;
    value.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(ACCESS_KEY_HEADER), value);
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> KmResult<T> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(KmError::UnexpectedStatus { status, body });
    }
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn config() -> ClientConfig {
        ClientConfig::new("http://127.0.0.1:1/v1", "token")
    }

    #[test]
    fn test_build_messages_shape() {
        let messages = KnowledgeModelClient::build_messages("u", "s", "DbC adviser");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "s");
        assert_eq!(messages[0].name.as_deref(), Some("DbC adviser"));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "u");
        assert_eq!(messages[1].name, None);
    }

    #[test]
    fn test_build_messages_is_idempotent() {
        let a = KnowledgeModelClient::build_messages("same", "sys", DEFAULT_SYSTEM_NAME);
        let b = KnowledgeModelClient::build_messages("same", "sys", DEFAULT_SYSTEM_NAME);
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_token_is_config_error() {
        let result = KnowledgeModelClient::new(ClientConfig::new("http://localhost", "bad\ntoken"));
        assert!(matches!(result, Err(KmError::Config(_))));
    }

    #[test]
    fn test_with_model_id_is_cached() {
        let client = KnowledgeModelClient::with_model_id(config(), "km-1").expect("client");
        assert_eq!(client.cached_model_id().map(|id| id.as_str()), Some("km-1"));
        let fresh = KnowledgeModelClient::new(config()).expect("client");
        assert!(fresh.cached_model_id().is_none());
    }

    #[test]
    fn test_query_options_defaults() {
        let options = QueryOptions::default();
        assert_eq!(options.system_name, "Coding assistant");
        assert!(options.system_content.is_none());
        assert!(!options.stream);
        assert_eq!(options.model, LanguageModel::Gpt4OMini);
    }

    #[tokio::test]
    async fn test_resolve_with_supplied_id_skips_network() {
        let client = KnowledgeModelClient::with_model_id(config(), "km-1").expect("client");
        let id = client.resolve_model_id().await.expect("cached id");
        assert_eq!(id.as_str(), "km-1");
    }

    #[tokio::test]
    async fn test_transport_failure_is_request_failed() {
        let client = KnowledgeModelClient::new(config()).expect("client");
        let err = client.check_alive().await.expect_err("nothing listens on port 1");
        assert!(matches!(err, KmError::RequestFailed(_)));
    }
}
