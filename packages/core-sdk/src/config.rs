use std::fmt;

use crate::error::{KmError, KmResult};

/** \brief 默认服务地址。 */
pub const DEFAULT_ENDPOINT: &str = "https://training.constructor.app/api/platform-kmapi/v1";
/** \brief 访问令牌所在的环境变量。 */
pub const TOKEN_ENV: &str = "CONSTRUCTOR_APP_API_TOKEN";
/** \brief 可选的服务地址覆盖。 */
pub const ENDPOINT_ENV: &str = "CONSTRUCTOR_APP_API_ENDPOINT";
/** \brief 为真时聊天接口接受任意状态码。 */
pub const ACCEPT_ANY_STATUS_ENV: &str = "KMFORGE_ACCEPT_ANY_STATUS";

/**
 * \brief 聊天补全接口对 HTTP 状态码的处理方式。
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatStatusPolicy {
    /** \brief 非 2xx 视为 `ChatFailed`。 */
    #[default]
    RequireSuccess,
    /** \brief 无论状态码如何都解析并返回响应体。 */
    AcceptAny,
}

/**
 * \brief 客户端的不可变配置，构造后不再修改。
 */
#[derive(Clone)]
pub struct ClientConfig {
    /** \brief 服务基地址 */
    pub endpoint: String,
    /** \brief Bearer 令牌 */
    pub token: String,
    /** \brief 聊天接口状态码策略 */
    pub chat_status_policy: ChatStatusPolicy,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            chat_status_policy: ChatStatusPolicy::default(),
        }
    }

    /**
     * \brief 从环境变量读取配置；令牌缺失或为空时报错。
     */
    pub fn from_env() -> KmResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> KmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_ENV)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| KmError::Config(format!("{} is not set", TOKEN_ENV)))?;
        let endpoint = lookup(ENDPOINT_ENV)
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let policy = match lookup(ACCEPT_ANY_STATUS_ENV).as_deref().map(str::trim) {
            Some("1") | Some("true") | Some("yes") => ChatStatusPolicy::AcceptAny,
            _ => ChatStatusPolicy::RequireSuccess,
        };
        Ok(Self::new(endpoint, token).with_chat_status_policy(policy))
    }

    pub fn with_chat_status_policy(mut self, policy: ChatStatusPolicy) -> Self {
        self.chat_status_policy = policy;
        self
    }

    /**
     * \brief 拼接接口地址，忽略基地址末尾的斜杠。
     */
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("chat_status_policy", &self.chat_status_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults_endpoint() {
        let cfg = ClientConfig::from_lookup(lookup_from(&[(TOKEN_ENV, "secret")]))
            .expect("config from env");
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.token, "secret");
        assert_eq!(cfg.chat_status_policy, ChatStatusPolicy::RequireSuccess);
    }

    #[test]
    fn test_from_lookup_requires_token() {
        let err = ClientConfig::from_lookup(lookup_from(&[(TOKEN_ENV, "  ")]))
            .expect_err("blank token rejected");
        assert!(matches!(err, KmError::Config(_)));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let cfg = ClientConfig::from_lookup(lookup_from(&[
            (TOKEN_ENV, "t"),
            (ENDPOINT_ENV, "http://127.0.0.1:9000/v1/"),
            (ACCEPT_ANY_STATUS_ENV, "true"),
        ]))
        .expect("config from env");
        assert_eq!(cfg.chat_status_policy, ChatStatusPolicy::AcceptAny);
        assert_eq!(
            cfg.url("/knowledge-models"),
            "http://127.0.0.1:9000/v1/knowledge-models"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let cfg = ClientConfig::new(DEFAULT_ENDPOINT, "super-secret");
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
