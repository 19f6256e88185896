pub mod cleanup;
pub mod processor;
pub mod scheduler;
pub mod tracker;
