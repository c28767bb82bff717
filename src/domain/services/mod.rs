mod chat_session;
mod history;

pub use chat_session::*;
pub use history::*;
