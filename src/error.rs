use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Replication error: {0}")]
    Replication(#[from] replication::ReplicationError),

    #[error("Server error: {0}")]
    Server(#[from] runtime::ServerError),

    #[error("Registry error: {0}")]
    Registry(#[from] registry::RegistryError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, MeshError>;
