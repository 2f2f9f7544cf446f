pub mod audit;
pub mod client;
pub mod config;
pub mod edits;
pub mod error;
pub mod model;
pub mod offboard;
pub mod prompt;
pub mod report;
