pub mod agent;
pub mod config;
pub mod error;
pub mod processes;
pub mod review;
pub mod shutdown;
pub mod task;
pub mod workflow;
pub mod workspace;

#[cfg(test)]
mod testing;
