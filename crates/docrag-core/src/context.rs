//! Formatting of retrieved chunks for a downstream text-generation service.
//!
//! Every block carries its source file, chunk id and score so that generated
//! answers can cite `[SOURCE: file | chunk]`.

use serde::{Deserialize, Serialize};

use crate::types::ScoredChunk;

/// Reply used when retrieval finds nothing or the model cannot ground an answer.
pub const NO_RELEVANT_CONTENT: &str = "I could not find that information in the documents.";

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// `[SOURCE: <source> | chunk <id> | score <score>]` followed by the chunk text.
pub fn format_block(hit: &ScoredChunk) -> String {
    format!(
        "[SOURCE: {} | chunk {} | score {:.3}]\n{}",
        hit.chunk.source, hit.chunk.chunk_id, hit.score, hit.chunk.text
    )
}

/// All blocks, in retrieval order, separated by horizontal rules.
pub fn format_context(hits: &[ScoredChunk]) -> String {
    hits.iter().map(format_block).collect::<Vec<_>>().join(BLOCK_SEPARATOR)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// System and user messages that restrict a generator to the retrieved context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedPrompt {
    pub system: String,
    pub user: String,
}

impl GroundedPrompt {
    /// Returns `None` when there is nothing to ground on; callers should reply
    /// with [`NO_RELEVANT_CONTENT`] instead of calling a generator.
    pub fn new(question: &str, hits: &[ScoredChunk]) -> Option<Self> {
        if hits.is_empty() {
            return None;
        }
        let system = format!(
            "You are a document assistant. Answer ONLY from the CONTEXT provided.\n\
             Rules:\n\
             1) If the answer is not in the CONTEXT, reply exactly: \"{NO_RELEVANT_CONTENT}\"\n\
             2) Do not use outside knowledge.\n\
             3) Cite your sources as [SOURCE: file | chunk].\n\
             4) Keep the answer clear and concise.\n"
        );
        let user = format!("QUESTION:\n{}\n\nCONTEXT:\n{}", question.trim(), format_context(hits));
        Some(Self { system, user })
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage { role: Role::System, content: self.system.clone() },
            ChatMessage { role: Role::User, content: self.user.clone() },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn hit(source: &str, chunk_id: usize, score: f32, text: &str) -> ScoredChunk {
        ScoredChunk { chunk: Chunk { source: source.into(), chunk_id, text: text.into() }, score }
    }

    #[test]
    fn block_cites_source_chunk_and_score() {
        let block = format_block(&hit("a.txt", 2, 0.81234, "The sky is blue."));
        assert_eq!(block, "[SOURCE: a.txt | chunk 2 | score 0.812]\nThe sky is blue.");
    }

    #[test]
    fn context_joins_blocks_in_order() {
        let ctx = format_context(&[hit("a.txt", 0, 0.9, "one"), hit("b.txt", 1, 0.5, "two")]);
        let parts: Vec<&str> = ctx.split("\n\n---\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("[SOURCE: a.txt | chunk 0"));
        assert!(parts[1].ends_with("two"));
    }

    #[test]
    fn no_prompt_without_hits() {
        assert!(GroundedPrompt::new("why?", &[]).is_none());
    }

    #[test]
    fn prompt_messages_serialize_as_chat() {
        let prompt = GroundedPrompt::new(" what colour is the sky? ", &[hit("a.txt", 0, 0.7, "blue")]).expect("prompt");
        assert!(prompt.user.starts_with("QUESTION:\nwhat colour is the sky?\n\nCONTEXT:\n[SOURCE: a.txt"));
        assert!(prompt.system.contains(NO_RELEVANT_CONTENT));
        let json = serde_json::to_value(prompt.messages()).expect("json");
        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[1]["role"], "user");
    }
}
