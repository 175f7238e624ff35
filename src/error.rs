use std::{env, io};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("state file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("cannot locate the state directory: {0}")]
    StateDir(#[from] env::VarError),

    #[error("invalid rect string {0:?}")]
    InvalidRect(String),
}

pub type Result<T> = std::result::Result<T, Error>;
