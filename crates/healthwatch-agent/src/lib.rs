pub mod guardrails;
pub mod investigation;
pub mod llm;
pub mod tools;

pub use investigation::{AgentLoop, AgentLoopOutcome, FlaggedPageContext};
pub use llm::LlmClient;
