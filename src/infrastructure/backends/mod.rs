pub mod gemma;
mod manager;
pub mod mock;

pub use manager::*;
