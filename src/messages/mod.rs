pub mod models;
pub mod services;
pub mod validators;


pub use models::{conversation_id, Message};
pub use services::MessageService;
