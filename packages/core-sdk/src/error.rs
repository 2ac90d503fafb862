use std::path::PathBuf;

use reqwest::StatusCode;

/**
 * \brief 知识模型客户端的错误分类。
 * \details 传输层失败与服务端状态码失败分开表示；删除失败属于非致命错误，由调用方决定是否继续。
 */
#[derive(Debug, thiserror::Error)]
pub enum KmError {
    #[error("no knowledge model available")]
    NoModelAvailable,
    #[error("upload failed: {status} -> {body}")]
    UploadFailed { status: StatusCode, body: String },
    #[error("request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("delete of document {document_id} failed: {status}")]
    DeleteFailed {
        document_id: String,
        status: StatusCode,
    },
    #[error("chat completion failed: {status} -> {body}")]
    ChatFailed { status: StatusCode, body: String },
    #[error("unexpected status: {status} -> {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration error: {0}")]
    Config(String),
}

impl KmError {
    /**
     * \brief 返回服务端观察到的 HTTP 状态码（若有）。
     */
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            KmError::UploadFailed { status, .. }
            | KmError::DeleteFailed { status, .. }
            | KmError::ChatFailed { status, .. }
            | KmError::UnexpectedStatus { status, .. } => Some(*status),
            KmError::RequestFailed(err) => err.status(),
            _ => None,
        }
    }

    /**
     * \brief 删除失败不应中断批量操作。
     */
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, KmError::DeleteFailed { .. })
    }
}

pub type KmResult<T> = Result<T, KmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reports_http_code() {
        let err = KmError::UploadFailed {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            body: "too big".to_string(),
        };
        assert_eq!(err.status(), Some(StatusCode::PAYLOAD_TOO_LARGE));
        assert!(!err.is_non_fatal());
        assert_eq!(err.to_string(), "upload failed: 413 Payload Too Large -> too big");

        assert_eq!(KmError::NoModelAvailable.status(), None);
    }

    #[test]
    fn test_delete_failure_is_non_fatal() {
        let err = KmError::DeleteFailed {
            document_id: "doc-1".to_string(),
            status: StatusCode::NOT_FOUND,
        };
        assert!(err.is_non_fatal());
        assert!(err.to_string().contains("doc-1"));
    }
}
