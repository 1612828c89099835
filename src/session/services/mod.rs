pub mod presence_service;
pub mod session_service;

pub use presence_service::PresenceService;
pub use session_service::SessionManager;
