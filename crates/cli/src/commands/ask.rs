//! Ask command handler.
//!
//! Runs one question through the RAG pipeline and prints the cited answer.

use anyhow::bail;
use clap::Args;
use veritas_core::{config::AppConfig, SearchMode};
use veritas_knowledge::{AnswerWarning, AskRequest, AskResponse, RagPipeline};

/// Answer a question from the knowledge base
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of passages to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Maximum tokens in the answer
    #[arg(long)]
    pub answer_max_tokens: Option<u32>,

    /// Style preset (base, audit-bullets, concise, qa, compare, table, json, card)
    #[arg(short, long)]
    pub style: Option<String>,

    /// Search mode (knn, hybrid)
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<SearchMode>,

    /// Character cap for the context block
    #[arg(long)]
    pub max_context_chars: Option<usize>,

    /// Output the full response as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_mode(s: &str) -> Result<SearchMode, String> {
    SearchMode::parse(s).map_err(|e| e.to_string())
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let pipeline = RagPipeline::from_config(config)?;
        let request = AskRequest {
            question: self.question.clone(),
            top_k: self.top_k,
            answer_max_tokens: self.answer_max_tokens,
            max_tokens: None,
            style: self.style.clone(),
            search_mode: self.mode,
            max_context_chars: self.max_context_chars,
        };

        // Dropping the request on Ctrl-C kills the backend process
        let response = tokio::select! {
            result = pipeline.ask(request) => result?,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, generation cancelled");
                bail!("Interrupted");
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            print_response(&response);
        }

        Ok(())
    }
}

fn print_response(response: &AskResponse) {
    println!("{}", response.answer);

    if !response.citations.is_empty() {
        println!();
        println!("Sources:");
        for citation in &response.citations {
            let label = citation
                .meta
                .get("url")
                .or_else(|| citation.meta.get("source_id"))
                .unwrap_or(&citation.id);
            println!("  [{}] {} ({})", citation.marker, citation.id, label);
        }
    }

    for warning in &response.warnings {
        match warning {
            AnswerWarning::UnderCited { accepted, required } => eprintln!(
                "warning: only {} of {} required passages fit the context",
                accepted, required
            ),
            AnswerWarning::CitationIntegrity { marker } => {
                eprintln!("warning: answer cites [{}], which is not in the context", marker)
            }
            AnswerWarning::NoCitationsUsed => eprintln!("warning: answer cites no passage"),
        }
    }
}
