//! duet-application: use-case layer orchestrating the duet matchmaking core.

pub mod chat_usecase;
pub mod config;

pub use chat_usecase::ChatUseCase;
pub use config::ChatConfig;
