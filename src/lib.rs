//! docpilot — an AI copilot that watches an editable document and proposes
//! edits, periodically and on request.

pub mod config;
pub mod host;
pub mod llm;
pub mod services;
pub mod sink;
pub mod state;
