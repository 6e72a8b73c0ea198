use horde_core::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("The ID '{0}' already exists")]
    DuplicateId(Uuid),
    #[error("Invalid audience name: '{0}'")]
    InvalidAudience(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
