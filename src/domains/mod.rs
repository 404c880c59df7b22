pub mod agent;
pub mod git;
pub mod repos;
pub mod sessions;
pub mod terminal;
