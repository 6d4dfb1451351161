pub mod desire;
pub mod memory;
pub mod message;
pub mod session;

pub use desire::{Desire, DesireCategory};
pub use memory::{MemoryKind, MemoryRecord};
pub use message::{ContentBlock, Message, MessageContent, Role};
pub use session::ConversationState;
