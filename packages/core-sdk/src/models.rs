use std::{fmt, str::FromStr};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/**
 * \brief 远端知识模型的标识。
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeModelId(String);

impl KnowledgeModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KnowledgeModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KnowledgeModelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for KnowledgeModelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/**
 * \brief 消息角色。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/**
 * \brief 消息结构，与 OpenAI Chat 消息格式对齐；`name` 为空时不序列化。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /** \brief 角色：system/user */
    pub role: Role,
    /** \brief 内容 */
    pub content: String,
    /** \brief 可选的发言者名称 */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: Some(name.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }
}

/**
 * \brief 文档索引状态；未知取值原样保留。
 */
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IndexingStatus {
    #[default]
    Pending,
    InProgress,
    Indexed,
    Failed,
    Other(String),
}

impl From<String> for IndexingStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "pending" | "queued" => IndexingStatus::Pending,
            "in_progress" | "processing" | "indexing" => IndexingStatus::InProgress,
            "indexed" | "completed" | "done" | "success" => IndexingStatus::Indexed,
            "failed" | "error" => IndexingStatus::Failed,
            _ => IndexingStatus::Other(raw),
        }
    }
}

impl From<IndexingStatus> for String {
    fn from(status: IndexingStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexingStatus::Pending => f.write_str("pending"),
            IndexingStatus::InProgress => f.write_str("in_progress"),
            IndexingStatus::Indexed => f.write_str("indexed"),
            IndexingStatus::Failed => f.write_str("failed"),
            IndexingStatus::Other(raw) => f.write_str(raw),
        }
    }
}

/**
 * \brief 挂载在知识模型上的远端文档。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /** \brief 文档 ID */
    pub id: String,
    /** \brief 上传时的文件名 */
    pub filename: String,
    /** \brief 是否参与检索 */
    #[serde(default)]
    pub in_use: bool,
    /** \brief 索引状态 */
    #[serde(default)]
    pub indexing_status: IndexingStatus,
}

/**
 * \brief 列表接口的通用外层结构。
 */
#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    #[serde(default)]
    pub total: Option<i64>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharedType {
    #[default]
    Private,
    All,
    Tenant,
    #[serde(other)]
    Unknown,
}

impl FromStr for SharedType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(SharedType::Private),
            "all" => Ok(SharedType::All),
            "tenant" => Ok(SharedType::Tenant),
            other => Err(format!("unknown shared type: {}", other)),
        }
    }
}

/**
 * \brief 知识模型记录。
 */
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeModel {
    pub id: KnowledgeModelId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub shared_type: Option<SharedType>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/**
 * \brief 创建知识模型的请求体。
 */
#[derive(Debug, Clone, Serialize)]
pub struct CreateKnowledgeModel {
    pub name: String,
    pub description: String,
    pub shared_type: SharedType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelProvider {
    pub name: String,
}

/**
 * \brief 服务端可用的语言模型条目。
 */
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hosted_by: Option<ModelProvider>,
    pub code: String,
}

/**
 * \brief 聊天补全使用的语言模型代码；未列出的代码走 `Custom`。
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LanguageModel {
    GeminiFlash,
    GeminiPro,
    GeminiFlash15,
    LearnlmProExperimental,
    ClaudeOpus,
    ClaudeHaiku,
    ClaudeSonnet,
    DeepSeekChat,
    DeepSeekR1,
    #[default]
    Gpt4OMini,
    Gpt4O,
    O1,
    O3Mini,
    Custom(String),
}

impl LanguageModel {
    pub fn as_str(&self) -> &str {
        match self {
            LanguageModel::GeminiFlash => "gemini-2.0-flash-001",
            LanguageModel::GeminiPro => "gemini-1.5-pro",
            LanguageModel::GeminiFlash15 => "gemini-1.5-flash",
            LanguageModel::LearnlmProExperimental => "learnlm-1.5-pro-experimental",
            LanguageModel::ClaudeOpus => "claude-3-opus-20240229",
            LanguageModel::ClaudeHaiku => "claude-3-5-haiku-20241022",
            LanguageModel::ClaudeSonnet => "claude-3-7-sonnet-20250219",
            LanguageModel::DeepSeekChat => "deepseek/deepseek-chat",
            LanguageModel::DeepSeekR1 => "deepseek/deepseek-r1",
            LanguageModel::Gpt4OMini => "gpt-4o-mini",
            LanguageModel::Gpt4O => "gpt-4o-2024-08-06",
            LanguageModel::O1 => "o1-2024-12-17",
            LanguageModel::O3Mini => "o3-mini",
            LanguageModel::Custom(code) => code,
        }
    }

    fn known() -> [LanguageModel; 13] {
        [
            LanguageModel::GeminiFlash,
            LanguageModel::GeminiPro,
            LanguageModel::GeminiFlash15,
            LanguageModel::LearnlmProExperimental,
            LanguageModel::ClaudeOpus,
            LanguageModel::ClaudeHaiku,
            LanguageModel::ClaudeSonnet,
            LanguageModel::DeepSeekChat,
            LanguageModel::DeepSeekR1,
            LanguageModel::Gpt4OMini,
            LanguageModel::Gpt4O,
            LanguageModel::O1,
            LanguageModel::O3Mini,
        ]
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageModel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Ok(Self::known()
            .into_iter()
            .find(|m| m.as_str() == code)
            .unwrap_or_else(|| LanguageModel::Custom(code.to_string())))
    }
}

impl Serialize for LanguageModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/**
 * \brief 聊天补全请求体。
 */
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: LanguageModel,
    pub messages: Vec<Message>,
    pub stream: bool,
}

/**
 * \brief 服务端返回的原始 JSON，不做结构校验，原样透传。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatResponse(Value);

impl ChatResponse {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /**
     * \brief 提取 `choices[*].message.content` 中的文本，缺失的字段直接跳过。
     */
    pub fn contents(&self) -> Vec<&str> {
        self.0
            .get("choices")
            .and_then(|c| c.as_array())
            .map(|choices| {
                choices
                    .iter()
                    .filter_map(|c| c.get("message"))
                    .filter_map(|m| m.get("content"))
                    .filter_map(|c| c.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/**
 * \brief 存活探测结果，保留原始状态码由调用方判断。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: StatusCode,
}

impl HealthStatus {
    pub fn is_alive(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serialization_skips_missing_name() {
        let user = serde_json::to_value(Message::user("hi")).expect("serialize user");
        assert_eq!(user, json!({"role": "user", "content": "hi"}));

        let system =
            serde_json::to_value(Message::system("be terse", "Coding assistant")).expect("serialize");
        assert_eq!(
            system,
            json!({"role": "system", "content": "be terse", "name": "Coding assistant"})
        );
    }

    #[test]
    fn test_document_parsing_validates_required_fields() {
        let doc: Document = serde_json::from_value(json!({
            "id": "f1",
            "filename": "v_list.txt",
            "in_use": true,
            "indexing_status": "INDEXED",
            "size": 1024
        }))
        .expect("parse document");
        assert_eq!(doc.id, "f1");
        assert!(doc.in_use);
        assert_eq!(doc.indexing_status, IndexingStatus::Indexed);

        let missing = serde_json::from_value::<Document>(json!({"filename": "x"}));
        assert!(missing.is_err());
    }

    #[test]
    fn test_indexing_status_keeps_unknown_values() {
        let status = IndexingStatus::from("vectorizing".to_string());
        assert_eq!(status, IndexingStatus::Other("vectorizing".to_string()));
        assert_eq!(String::from(status), "vectorizing");
    }

    #[test]
    fn test_language_model_codes() {
        assert_eq!(LanguageModel::default().as_str(), "gpt-4o-mini");
        let parsed: LanguageModel = "gemini-1.5-pro".parse().expect("infallible");
        assert_eq!(parsed, LanguageModel::GeminiPro);
        let custom: LanguageModel = "my-model".parse().expect("infallible");
        assert_eq!(custom, LanguageModel::Custom("my-model".to_string()));
        assert_eq!(
            serde_json::to_value(&custom).expect("serialize model"),
            json!("my-model")
        );
    }

    #[test]
    fn test_chat_request_wire_shape() {
        let req = ChatRequest {
            model: LanguageModel::GeminiFlash15,
            messages: vec![Message::system("s", "n"), Message::user("u")],
            stream: false,
        };
        let v = serde_json::to_value(&req).expect("serialize request");
        assert_eq!(v["model"], "gemini-1.5-flash");
        assert_eq!(v["stream"], false);
        assert_eq!(v["messages"][1]["content"], "u");
    }

    #[test]
    fn test_chat_response_contents() {
        let resp = ChatResponse::new(json!({
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "ensure Result = a + b"}},
                {"index": 1, "message": {"role": "assistant"}}
            ]
        }));
        assert_eq!(resp.contents(), vec!["ensure Result = a + b"]);
        assert!(ChatResponse::new(json!({"detail": "oops"})).contents().is_empty());
    }

    #[test]
    fn test_shared_type_parsing() {
        assert_eq!("Tenant".parse::<SharedType>(), Ok(SharedType::Tenant));
        assert!("public".parse::<SharedType>().is_err());
        let parsed: SharedType = serde_json::from_value(json!("org")).expect("other variant");
        assert_eq!(parsed, SharedType::Unknown);
    }
}
