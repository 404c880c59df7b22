pub mod branches;
pub mod repository;
pub mod service;
pub mod worktrees;
