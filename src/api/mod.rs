pub mod client;
pub mod models;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::HttpAssistantApi;
pub use traits::AssistantApi;
pub use types::{ApiError, ChatReply, LoginReply, RegisterReply};
