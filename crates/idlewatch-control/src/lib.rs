pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod notifier;
pub mod orchestrator;
pub mod registry;
pub mod remote;
pub mod scheduler;
pub mod state;
pub mod tracker;

#[cfg(test)]
mod testing;
