pub mod openai;

pub use openai::{OpenAiClient, OpenAiConfig};
