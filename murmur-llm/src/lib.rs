//! murmur-llm: conversation with a remote chat model

pub mod config;
pub mod providers;
pub mod session;


pub use config::*;
pub use providers::{parse_chat_response, ChatProvider, OpenAiChatProvider};
pub use session::{trim_turns, ConversationSession};
