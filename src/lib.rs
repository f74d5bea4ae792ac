//! Ticket Sentinel: a Discord support-ticket assistant.

pub mod channels;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod pipeline;
pub mod safety;
pub mod state;
