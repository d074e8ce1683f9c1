pub mod browser;
pub mod message;

pub use browser::Engine;
pub use message::{Message, Record, RecordData};
