pub mod llm;

pub use llm::{
    HttpModelProvider, LanguageModel, Message, MockModel, ModelRequestConfig, ModelResponse,
};
