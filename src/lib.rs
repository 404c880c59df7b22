pub mod cli;
pub mod config;
pub mod domains;
pub mod gateway;
pub mod infrastructure;
pub mod shared;
