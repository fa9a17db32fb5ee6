// src/crypto.rs
use crate::config::Argon2Params;
use crate::error::{CryptoError, CryptoResult};
use log;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use rand::RngCore;

const SALT_LEN: usize = 16;

/// Generates a random salt for Argon2.
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Hashes an entry password with Argon2id and returns the PHC string.
/// A fresh salt is drawn for every call, so equal passwords never share a hash.
pub fn hash_entry_password(password: &str, argon2_config: &Argon2Params) -> CryptoResult<String> {
    let salt_bytes = generate_salt();
    let salt = SaltString::b64_encode(&salt_bytes).map_err(|e| {
        let msg = format!("Salt encoding failed: {}", e);
        log::error!("hash_entry_password: {}", msg);
        CryptoError::Argon2(msg)
    })?;

    let params = argon2::Params::new(
        argon2_config.m_cost,
        argon2_config.t_cost,
        argon2_config.p_cost,
        None,
    )
    .map_err(|e| {
        let msg = format!("Argon2 params error: {}", e);
        log::error!("hash_entry_password: {}", msg);
        CryptoError::Argon2(msg)
    })?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            let msg = format!("Hashing failed: {}", e);
            log::error!("hash_entry_password: {}", msg);
            CryptoError::Argon2(msg)
        })?
        .to_string();

    Ok(password_hash)
}

/// Verifies a password against a stored PHC string.
/// `Ok(false)` means a plain mismatch; `Err` means the stored hash is unusable.
pub fn verify_entry_password(hashed_password_str: &str, password: &str) -> CryptoResult<bool> {
    let parsed_hash = PasswordHash::new(hashed_password_str).map_err(|e| {
        let msg = format!("Parsing hash failed: {}", e);
        log::error!("verify_entry_password: {}", msg);
        CryptoError::Argon2(msg)
    })?;

    // Parameters are taken from the parsed hash.
    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => {
            log::debug!("verify_entry_password: password mismatch");
            Ok(false)
        }
        Err(e) => {
            let msg = format!("Verification failed: {}", e);
            log::error!("verify_entry_password: {}", msg);
            Err(CryptoError::Argon2(msg))
        }
    }
}

#[cfg(test)]
pub(crate) fn test_params() -> Argon2Params {
    Argon2Params {
        m_cost: 1024,
        t_cost: 1,
        p_cost: 1,
    }
}
