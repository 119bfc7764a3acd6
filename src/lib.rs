pub mod aspect;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod source;
