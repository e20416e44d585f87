use std::sync::Arc;

use atelier_core::error::Result;
use atelier_core::traits::CompletionClient;
use atelier_core::types::ChatMessage;

const REPORTER_SYSTEM_PROMPT: &str = "You are an expert at comprehensive report writing, skilled at integrating results from multiple sources into an insightful, coherent report.";

/// Aggregates all task results into the final answer.
#[derive(Clone)]
pub struct Reporter {
    llm: Arc<dyn CompletionClient>,
}

impl Reporter {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    pub async fn run(&self, query: &str, results: &[String]) -> Result<String> {
        let results_str = results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("Info {}:\n{}", i + 1, r))
            .collect::<Vec<_>>()
            .join("\n\n");

        let user = format!(
            "Task: produce a comprehensive, coherent answer based on the information below.\n\
             Requirements:\n\
             1. Integrate all provided information into a well-structured answer.\n\
             2. Answer the original query directly.\n\
             3. Include the key points and findings from each piece of information.\n\
             4. Close with a conclusion or summary.\n\
             5. Be detailed yet concise, around 250-300 words.\n\n\
             The user's request: {}\n\
             Collected information:\n{}",
            query, results_str,
        );

        self.llm
            .complete(vec![
                ChatMessage::system(REPORTER_SYSTEM_PROMPT),
                ChatMessage::user(user),
            ])
            .await
    }
}
