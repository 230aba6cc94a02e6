pub mod account;
pub mod conversation;
pub mod message;

pub use account::{Account, Credential};
pub use conversation::{Conversation, ConversationDetail};
pub use message::{DeliveryStatus, Message, Role};
