// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Argon2 hashing failed: {0}")]
    Argon2(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Remote table request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote table returned an unexpected response: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum GuestbookError {
    #[error("No guestbook entry with id '{0}'")]
    NotFound(String),
    #[error("Password missing or incorrect for entry '{0}'")]
    Unauthorized(String),
    #[error("The {backend} backend does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Cryptography error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Guestbook error: {0}")]
    Guestbook(#[from] GuestbookError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CLI error: {0}")]
    Cli(String),
}

pub type AppResult<T> = Result<T, AppError>;
pub type CryptoResult<T> = Result<T, CryptoError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type GuestbookResult<T> = Result<T, GuestbookError>;
