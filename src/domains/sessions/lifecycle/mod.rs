pub mod bootstrapper;
pub mod hooks;
pub mod removal;
