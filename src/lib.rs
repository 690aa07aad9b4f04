pub mod authority;
pub mod cli;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod observer;
pub mod services;
pub mod types;
pub mod workflow;

#[cfg(test)]
pub mod testing;
