pub mod context;
pub mod copilot;
pub mod history;
pub mod prompt;
pub mod request;
pub mod scheduler;
pub mod snapshot;
pub mod suggestion;
