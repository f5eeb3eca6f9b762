pub mod conversation;
pub mod message;
pub mod mood;
pub mod payment;
pub mod usage;
pub mod user;

// Re-export common types
pub use conversation::{Conversation, NewConversation, DEFAULT_TITLE};
pub use message::{GuestMessage, HistoryEntry, Message, NewMessage, Role, HISTORY_LIMIT};
pub use mood::Mood;
pub use payment::{PaymentEvent, SkipCashPayload};
pub use usage::{DayWindow, UsageCounter};
pub use user::{NewUserProfile, Plan, SubStatus, User, UserUpdate};
