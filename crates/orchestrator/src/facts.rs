//! The fact tracker (C7): a single string per Plan, overwritten after every
//! step via a dedicated no-tools LLM call that receives the old facts.

use llm::{LlmClient, Message};

const UPDATE_FACTS_SYSTEM_PROMPT: &str =
    "You maintain a running fact sheet for an ongoing multi-step task. \
     Given the existing facts and the outcome of the step just completed, \
     produce an updated fact sheet: a concise list of verified facts relevant \
     to the remaining work. Keep facts that are still true; drop ones the new \
     step result contradicts; add new ones the step result established.";

/// Asks the LLM to fold a step's outcome into the running fact sheet.
pub async fn update_facts(
    llm_client: &LlmClient,
    old_facts: &str,
    step_description: &str,
    step_result: &str,
) -> llm::Result<String> {
    let messages = vec![
        Message::system(UPDATE_FACTS_SYSTEM_PROMPT),
        Message::user(format!(
            "Existing facts:\n{old_facts}\n\nStep: {step_description}\nResult: {step_result}\n\nUpdated facts:"
        )),
    ];
    llm_client.chat(messages).await
}
