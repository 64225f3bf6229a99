pub mod api;
pub mod progress;
pub mod server;
pub mod transcribe;
