//! Publish port trait: push a file into a remote repository.

use crate::domain::error::DipLadderError;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub path: String,
    pub content: Vec<u8>,
    pub message: String,
    /// SHA of the file being replaced; `None` creates a new file.
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Created,
    Updated,
    Conflict,
    NotFound,
}

pub trait PublishPort {
    fn existing_sha(&self, path: &str) -> Result<Option<String>, DipLadderError>;

    fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, DipLadderError>;
}
