mod backend;
mod conversation;
mod error;
mod message;
mod session;
mod slash_commands;

pub use backend::*;
pub use conversation::*;
pub use error::*;
pub use message::*;
pub use session::*;
pub use slash_commands::*;
