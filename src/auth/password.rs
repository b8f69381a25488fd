use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("password task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub fn hash_blocking(password: &str, cost: u32) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// bcrypt is CPU-bound, so hashing runs on the blocking pool.
pub async fn hash(password: String, cost: u32) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_blocking(&password, cost)).await?
}

pub async fn verify(password: String, hash: String) -> Result<bool, PasswordError> {
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(matches)
}
