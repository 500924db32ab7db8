pub mod config;
pub mod editor;
pub mod error;
pub mod issue;
pub mod operator;
pub mod ticket;
pub mod workflow;
pub mod workspace;
