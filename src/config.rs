pub const APP_ID: &str = "com.aura.Aura";
pub const APP_NAME: &str = "Aura";

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shown by the assistant when a chat session starts.
pub const GREETING: &str = "Hi! I'm **AURA**, your emotion-aware movie companion. \
I can understand how you're feeling and recommend the perfect movies for your mood. \
How are you feeling today?";

/// Title used when the server omits one.
pub const UNTITLED_CONVERSATION: &str = "New Chat";
