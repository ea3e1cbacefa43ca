//! Prompt construction for chat-style providers.
//!
//! Each operation gets a system prompt describing the task and the exact
//! JSON shape expected back; the user message carries the normalized text
//! plus any context fields.

use std::fmt::Write;

use super::traits::ProviderRequest;
use crate::types::OperationKind;

const LANGUAGE_RULE: &str = "Respond in exactly the same language as the user's \
    experience description. Do not translate and do not switch languages. This \
    applies to every string in your answer.";

fn task(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::GenerateDraft => {
            "You are a professional resume strategist. The user describes one \
             experience. Give it a short, smart title. Write resume bullet points \
             that say what was done, how, the measurable result and how long it \
             took, each starting with a strong verb. Extract the hard and soft \
             skills the person likely used. Ask three short follow-up questions \
             based only on what the user wrote, aimed at missing metrics, scale or \
             duration."
        }
        OperationKind::GenerateFollowups => {
            "You are a resume coach. Ask three short, targeted follow-up questions \
             about the user's experience description, aimed at measurable results, \
             scale and duration. Base them only on what the user wrote."
        }
        OperationKind::Finalize => {
            "You are a resume builder. The user shared an experience and answered \
             follow-up questions about it. Rewrite the resume bullet points using \
             both, adding the specific metrics and impact from the answers, update \
             the skills, and suggest what else could be quantified."
        }
        OperationKind::Improve => {
            "You are a resume editor. Rewrite the user's resume bullet points so each \
             starts with a strong verb and states a concrete, measurable outcome. \
             Keep the facts; do not invent numbers."
        }
    }
}

/// System prompt for `request`, including the response shape.
pub fn system_prompt(request: &ProviderRequest) -> String {
    format!(
        "{}\n\n{LANGUAGE_RULE}\n\nReply with JSON only, no prose and no code fences. \
         Your reply must be {}.",
        task(request.operation),
        request.schema.describe()
    )
}

/// User message: the text, then one `key: value` line per context field.
pub fn user_message(request: &ProviderRequest) -> String {
    let mut out = request.input.text.clone();
    if !request.input.fields.is_empty() {
        out.push_str("\n\n");
        for (key, value) in &request.input.fields {
            let _ = writeln!(out, "{}: {value}", key.replace('_', " "));
        }
    }
    out.trim_end().to_string()
}
