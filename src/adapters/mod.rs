// Adapters: concrete clients for the LLM provider, GitHub, Google Forms and local storage.

pub mod forms;
pub mod github;
pub mod llm;
pub mod storage;
