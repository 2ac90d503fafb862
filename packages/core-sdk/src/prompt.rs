use std::path::Path;

use anyhow::{bail, Context, Result};

/** \brief 系统消息默认携带的名称。 */
pub const DEFAULT_SYSTEM_NAME: &str = "Coding assistant";

/**
 * \brief 默认系统提示：要求模型只补全基于模型的契约。
 */
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a coding assistant, expert in the Eiffel programming language and in formal methods.
You have extensive training in the usage of AutoProof, the static verifier of Eiffel.
You will receive a prompt in eiffel code with holes of the form <ADD_*>.
Write only model-based contracts, i.e. all qualified calls in all contract clauses will refer to the model of the target class and all unqualified calls in all contract clauses will refer to the model of the current class or its ancestors.
Respond with the same code, substituting the holes with valid eiffel code.
";

/**
 * \brief 读取提示文件内容，空文件视为错误。
 */
pub fn load_prompt(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read prompt file {} failed", path.display()))?;
    if content.trim().is_empty() {
        bail!("prompt file {} is empty", path.display());
    }
    Ok(content)
}
