pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod prompt;
pub mod telemetry;

/**
 * \brief SDK 预导入集合，方便外部引用常用类型。
 */
pub mod prelude {
    pub use crate::client::{KnowledgeModelClient, QueryOptions, RemovalReport};
    pub use crate::config::{ChatStatusPolicy, ClientConfig};
    pub use crate::error::{KmError, KmResult};
    pub use crate::models::{
        ChatResponse, CreateKnowledgeModel, Document, IndexingStatus, KnowledgeModelId,
        LanguageModel, Message, Role, SharedType,
    };
    pub use crate::prompt;
    pub use crate::telemetry;
}
