// Re-export needed modules for testing
pub mod backend; // Hosted auth/data service boundary
pub mod chat; // Conversation store and simulated delivery
pub mod config;
pub mod models;

// Re-export main types for convenience
pub use chat::{ChatError, ChatStore, StoreEvent};
pub use models::*;
