use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pdf_qa_core::{
    available_documents, ConfiguredEmbedder, GeminiClient, PdfTextExtractor, PipelineConfig,
    QaPipeline, QaRequest,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-qa", version, about = "Ask questions about one PDF document")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the question-answering pipeline for one document.
    Ask {
        /// Document reference: a filename under the documents directory, or
        /// an http(s) URL.
        #[arg(long, conflicts_with = "input")]
        document: Option<String>,

        /// Question to answer; repeat the flag for several questions.
        #[arg(long = "question", conflicts_with = "input")]
        questions: Vec<String>,

        /// JSON request file: {"documents": "...", "questions": ["..."]}.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// List the PDF documents available under the documents directory.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;

    match cli.command {
        Command::Ask {
            document,
            questions,
            input,
        } => {
            let request = match input {
                Some(path) => {
                    let raw = fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    serde_json::from_str::<QaRequest>(&raw)
                        .with_context(|| format!("invalid request file {}", path.display()))?
                }
                None => QaRequest {
                    documents: document
                        .context("--document is required when --input is not given")?,
                    questions,
                },
            };

            let extractor = PdfTextExtractor::from_config(&config);
            let embedder = ConfiguredEmbedder::from_config(&config)?;
            let completion = GeminiClient::from_config(&config)?;
            let pipeline = QaPipeline::new(&config, extractor, embedder, completion);

            info!(
                document = %request.documents,
                questions = request.questions.len(),
                "running qa pipeline"
            );
            let response = pipeline.run(&request.documents, &request.questions).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::List => {
            let documents = available_documents(&config.documents_dir);
            if documents.is_empty() {
                println!(
                    "no pdf documents under {}",
                    config.documents_dir.display()
                );
            }
            for path in documents {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}
