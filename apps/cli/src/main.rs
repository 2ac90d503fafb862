use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use kmforge_core_sdk::prelude::*;

/**
 * \brief CLI 程序入口，逐一暴露知识模型客户端的操作。
 */
#[derive(Parser, Debug)]
#[command(
    name = "kmforge",
    version,
    about = "Knowledge-model client for model-based contract generation"
)]
struct Cli {
    /** \brief 指定知识模型 ID，缺省取服务端列表中的第一个。 */
    #[arg(long, global = true)]
    model_id: Option<String>,

    /** \brief 将请求记录追加到 logs/kmforge.log。 */
    #[arg(long, global = true, default_value_t = false)]
    journal: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 探测服务是否存活。
     */
    Alive,

    /**
     * \brief 列出可见的知识模型。
     */
    Models,

    /**
     * \brief 列出服务端支持的语言模型。
     */
    LanguageModels,

    /**
     * \brief 新建知识模型。
     * \param name        模型名称
     * \param description 模型描述
     * \param shared_type 共享范围：private/all/tenant
     */
    CreateModel {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "private")]
        shared_type: SharedType,
    },

    /**
     * \brief 管理知识模型上的文档。
     */
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /**
     * \brief 发送一次聊天补全请求并输出回复。
     */
    Query {
        #[arg(long, required_unless_present = "prompt_file", conflicts_with = "prompt_file")]
        prompt: Option<String>,
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        /** \brief 系统消息文件，缺省使用内置的契约提示。 */
        #[arg(long)]
        system_file: Option<PathBuf>,
        #[arg(long, default_value = "gpt-4o-mini")]
        model: LanguageModel,
        #[arg(long, default_value_t = false)]
        stream: bool,
        /** \brief 非 2xx 响应也按成功解析。 */
        #[arg(long, default_value_t = false)]
        accept_any_status: bool,
        /** \brief 输出完整 JSON 而不是回复文本。 */
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
}

#[derive(Subcommand, Debug)]
enum DocsAction {
    /** \brief 列出文档。 */
    List,
    /** \brief 依次上传本地文件。 */
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /** \brief 删除单个文档。 */
    Rm { id: String },
    /** \brief 删除全部文档，单个失败不会中断。 */
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing("info");
    telemetry::set_enabled(cli.journal);

    let config = ClientConfig::from_env().context("load configuration failed")?;

    match cli.command {
        Commands::Alive => {
            let client = open_client(config, cli.model_id)?;
            let health = client.check_alive().await.context("alive probe failed")?;
            println!(
                "{} ({})",
                if health.is_alive() { "alive" } else { "not alive" },
                health.status
            );
        }
        Commands::Models => {
            let client = open_client(config, cli.model_id)?;
            let models = client
                .list_knowledge_models()
                .await
                .context("list knowledge models failed")?;
            if models.is_empty() {
                println!("No knowledge model available");
            }
            for model in models {
                println!(
                    "{}\t{}\t{}",
                    model.id,
                    model.name,
                    model.description.unwrap_or_default()
                );
            }
        }
        Commands::LanguageModels => {
            let client = open_client(config, cli.model_id)?;
            let models = client
                .list_language_models()
                .await
                .context("list language models failed")?;
            for model in models {
                let host = model.hosted_by.map(|p| p.name).unwrap_or_default();
                println!("{}\t{}\t{}", model.code, model.name, host);
            }
        }
        Commands::CreateModel {
            name,
            description,
            shared_type,
        } => {
            let params = CreateKnowledgeModel {
                name,
                description,
                shared_type,
            };
            let client = KnowledgeModelClient::create(config, &params)
                .await
                .context("create knowledge model failed")?;
            if let Some(id) = client.cached_model_id() {
                println!("Created knowledge model id={}", id);
            }
        }
        Commands::Docs { action } => {
            let client = open_client(config, cli.model_id)?;
            run_docs(&client, action).await?;
        }
        Commands::Query {
            prompt: prompt_text,
            prompt_file,
            system_file,
            model,
            stream,
            accept_any_status,
            raw,
        } => {
            let config = if accept_any_status {
                config.with_chat_status_policy(ChatStatusPolicy::AcceptAny)
            } else {
                config
            };
            let client = open_client(config, cli.model_id)?;

            let system_content = system_file
                .map(|path| prompt::load_prompt(&path))
                .transpose()
                .context("load system prompt failed")?;
            let options = QueryOptions {
                system_content,
                model,
                stream,
                ..QueryOptions::default()
            };

            let response = match (prompt_text, prompt_file) {
                (Some(text), _) => client.query(&text, &options).await,
                (None, Some(path)) => client.query_from_file(&path, &options).await,
                (None, None) => bail!("either --prompt or --prompt-file is required"),
            }
            .context("chat completion failed")?;

            let contents = response.contents();
            if raw || contents.is_empty() {
                println!("{}", serde_json::to_string_pretty(response.as_value())?);
            } else {
                println!("{}", contents.join("\n"));
            }
        }
    }

    Ok(())
}

fn open_client(config: ClientConfig, model_id: Option<String>) -> Result<KnowledgeModelClient> {
    let client = match model_id {
        Some(id) => KnowledgeModelClient::with_model_id(config, id),
        None => KnowledgeModelClient::new(config),
    };
    client.context("build client failed")
}

async fn run_docs(client: &KnowledgeModelClient, action: DocsAction) -> Result<()> {
    match action {
        DocsAction::List => {
            let docs = client
                .list_documents()
                .await
                .context("list documents failed")?;
            for doc in docs {
                println!(
                    "{}, {}, {}, {}",
                    doc.filename, doc.in_use, doc.indexing_status, doc.id
                );
            }
        }
        DocsAction::Upload { paths } => {
            let total = paths.len();
            let mut failed = 0usize;
            for path in paths {
                match client.upload_document(&path).await {
                    Ok(doc) => println!("Uploaded {} -> id={}", path.display(), doc.id),
                    Err(err) => {
                        failed += 1;
                        eprintln!("Failed to upload {}: {}", path.display(), err);
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} uploads failed", failed, total);
            }
        }
        DocsAction::Rm { id } => match client.remove_document(&id).await {
            Ok(()) => println!("Removed {}", id),
            Err(err) if err.is_non_fatal() => eprintln!("{}", err),
            Err(err) => return Err(err).context("remove document failed"),
        },
        DocsAction::Clear => {
            let report = client
                .remove_all_documents()
                .await
                .context("list documents failed")?;
            for id in &report.removed {
                println!("Removed {}", id);
            }
            for (id, err) in &report.failed {
                eprintln!("Failed to remove {}: {}", id, err);
            }
            tracing::info!(
                removed = report.removed.len(),
                failed = report.failed.len(),
                "clear finished"
            );
        }
    }
    Ok(())
}
