use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Audit log error: {0}")]
    Audit(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
