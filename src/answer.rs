//! Grounded answer composition.
//!
//! Takes the leading candidates in retrieval order, wraps them in a prompt
//! that confines the model to those excerpts, and returns the model's reply.
//! Failures never escape: an empty candidate list yields
//! [`NO_CONTEXT_ANSWER`] and a model error yields an explanatory string.

use crate::llm::LanguageModel;
use crate::models::CandidatePassage;

/// Returned when retrieval produced nothing to ground an answer on.
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant documents found or context is insufficient to answer your question.";

/// Build the single-turn prompt from the first `limit` candidates.
pub fn build_prompt(question: &str, candidates: &[CandidatePassage], limit: usize) -> String {
    let context = candidates
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, c)| format!("Document {}:\n{}", i + 1, c.text.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an assistant answering questions from a private knowledge base.\n\
         Answer strictly from the document excerpts below. Do not rely on prior \
         knowledge or outside sources, and do not guess.\n\
         \n\
         ### Knowledge Base Excerpts\n\
         {context}\n\
         \n\
         ### Question\n\
         {question}\n\
         \n\
         ### Instructions\n\
         1. Find the excerpts relevant to the question and prefer the most specific details.\n\
         2. Answer clearly and concisely, using short paragraphs or bullet points.\n\
         3. If the excerpts do not contain the answer, reply: \
         \"I couldn't find relevant information in the provided knowledge base.\"\n"
    )
}

/// Answer `question` from `candidates` using `llm`. Never fails.
pub async fn compose_answer(
    question: &str,
    candidates: &[CandidatePassage],
    llm: &dyn LanguageModel,
    limit: usize,
) -> String {
    if candidates.is_empty() {
        return NO_CONTEXT_ANSWER.to_string();
    }

    let prompt = build_prompt(question, candidates, limit);
    match llm.complete(&prompt).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::error!(error = %e, "language model call failed");
            format!("Error querying language model: {}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for Recorder {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("recorded".to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl LanguageModel for Broken {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::Request("rate limited".into()))
        }
    }

    fn passages(n: usize) -> Vec<CandidatePassage> {
        (1..=n)
            .map(|i| CandidatePassage {
                text: format!("  passage {}  ", i),
                score: 1.0 / i as f32,
            })
            .collect()
    }

    #[test]
    fn prompt_lists_first_excerpts_in_order() {
        let prompt = build_prompt("What is the refund policy?", &passages(7), 5);
        assert!(prompt.contains("Document 1:\npassage 1\nDocument 2:\npassage 2"));
        assert!(prompt.contains("Document 5:\npassage 5"));
        assert!(!prompt.contains("passage 6"));
        assert!(!prompt.contains("Document 6"));
        assert!(prompt.contains("What is the refund policy?"));
        assert!(prompt.contains("strictly from the document excerpts"));
    }

    #[tokio::test]
    async fn empty_candidates_skip_the_model() {
        let llm = Recorder::default();
        let answer = compose_answer("q", &[], &llm, 5).await;
        assert_eq!(answer, NO_CONTEXT_ANSWER);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_request_per_question() {
        let llm = Recorder::default();
        let answer = compose_answer("q", &passages(3), &llm, 5).await;
        assert_eq!(answer, "recorded");
        assert_eq!(llm.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn model_errors_become_answer_text() {
        let answer = compose_answer("q", &passages(1), &Broken, 5).await;
        assert_eq!(answer, "Error querying language model: rate limited");
    }
}
