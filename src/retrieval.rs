//! Retrieval and answer orchestration.
//!
//! `ask` embeds the question, runs a project-scoped nearest-neighbour query,
//! and, only when something was found, asks the completion provider to
//! answer from the retrieved chunks. `search` stops after the query and
//! returns short previews.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use codebase_assistant_core::completion::CompletionParams;
use codebase_assistant_core::filter::Filter;
use codebase_assistant_core::models::Match;
use codebase_assistant_core::store::Include;

use crate::context::AppContext;
use crate::error::{AssistantError, Result};

/// Returned when the query finds nothing; the completion provider is not called.
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn\u{2019}t find relevant chunks for that question in the selected project.";

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub rel_path: String,
    pub chunk_idx: usize,
    pub preview: String,
    pub distance: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub count: usize,
    pub results: Vec<SearchHit>,
}

fn scope(project_id: Option<&str>) -> Filter {
    match project_id.filter(|p| !p.is_empty()) {
        Some(p) => Filter::project(p),
        None => Filter::All,
    }
}

async fn embed_query(ctx: &AppContext, text: &str) -> Result<Vec<f32>> {
    if text.trim().is_empty() {
        return Err(AssistantError::InvalidInput(
            "query must not be empty".to_string(),
        ));
    }
    ctx.embedder
        .embed_one(text)
        .await
        .map_err(AssistantError::Embedding)
}

/// Answer `question` from the chunks of `project_id` (or all projects).
pub async fn ask(
    ctx: &AppContext,
    question: &str,
    project_id: Option<&str>,
    top_k: usize,
) -> Result<AskResponse> {
    let embedding = embed_query(ctx, question).await?;
    let matches = ctx
        .store
        .query(&embedding, top_k.max(1), &scope(project_id), Include::ALL)
        .await?;

    if matches.is_empty() {
        debug!(?project_id, "no matches, skipping completion");
        return Ok(AskResponse {
            answer: NO_CONTEXT_ANSWER.to_string(),
            matches,
        });
    }

    let prompt = build_prompt(question, &matches);
    let params = CompletionParams {
        temperature: ctx.config.llm.temperature,
        max_tokens: ctx.config.llm.max_tokens,
    };
    let raw = ctx
        .completion
        .complete(&prompt, params)
        .await
        .map_err(AssistantError::Completion)?;

    info!(?project_id, matches = matches.len(), model = ctx.completion.model_name(), "answered");

    Ok(AskResponse {
        answer: wrap_text(raw.trim(), ctx.config.retrieval.wrap_width),
        matches,
    })
}

/// Retrieval-only search returning previews, no completion call.
pub async fn search(ctx: &AppContext, query: &str, project_id: Option<&str>) -> Result<SearchResponse> {
    let embedding = embed_query(ctx, query).await?;
    let matches = ctx
        .store
        .query(
            &embedding,
            ctx.config.retrieval.search_limit,
            &scope(project_id),
            Include::ALL,
        )
        .await?;

    let preview_chars = ctx.config.retrieval.preview_chars;
    let results: Vec<SearchHit> = matches
        .into_iter()
        .map(|m| SearchHit {
            rel_path: m.metadata.rel_path,
            chunk_idx: m.metadata.chunk_idx,
            preview: m.text.chars().take(preview_chars).collect(),
            distance: m.distance,
        })
        .collect();

    Ok(SearchResponse {
        count: results.len(),
        results,
    })
}

/// Prompt listing every match as `File: {rel_path} (chunk {idx})`.
pub fn build_prompt(question: &str, matches: &[Match]) -> String {
    let mut context = String::new();
    for m in matches {
        context.push_str(&format!(
            "\nFile: {} (chunk {})\n{}\n---\n",
            m.metadata.rel_path, m.metadata.chunk_idx, m.text
        ));
    }

    format!(
        "\nYou are an AI assistant helping developers understand their private codebase.\n\
         Answer the question below using only the provided code context.\n\
         Be concise and cite file names and function names when relevant.\n\
         \n\
         Question:\n\
         {}\n\
         \n\
         Relevant Code:\n\
         {}\n",
        question, context
    )
}

/// Greedy word wrap. Paragraphs (blank-line separated) are wrapped
/// independently; whitespace inside a paragraph is collapsed. Words longer
/// than `width` sit on their own line. `width == 0` returns `text` as is.
pub fn wrap_text(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut paragraphs = Vec::new();
    for para in text.split("\n\n") {
        let mut lines: Vec<String> = Vec::new();
        let mut line = String::new();
        let mut line_len = 0;
        for word in para.split_whitespace() {
            let word_len = word.chars().count();
            if line_len > 0 && line_len + 1 + word_len > width {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line.push_str(word);
            line_len += word_len;
        }
        if !line.is_empty() {
            lines.push(line);
        }
        if !lines.is_empty() {
            paragraphs.push(lines.join("\n"));
        }
    }
    paragraphs.join("\n\n")
}
