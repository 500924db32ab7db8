pub mod git;
pub mod manager;
pub mod repository;

pub use git::CherryPickResult;
pub use manager::WorkspaceManager;
pub use repository::{GitRepository, Repository};
