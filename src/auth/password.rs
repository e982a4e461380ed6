use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

use crate::error::ServiceError;

/// Argon2id cost settings used for new hashes.
#[derive(Debug, Clone, Copy)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        HashCost {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
        }
    }
}

pub fn hash_password(password: &str, cost: HashCost) -> Result<String, ServiceError> {
    if password.is_empty() {
        return Err(ServiceError::invalid("password must not be empty"));
    }
    let params = Params::new(cost.memory_kib, cost.iterations, Params::DEFAULT_P_COST, None)
        .map_err(|e| ServiceError::Internal(format!("invalid password hash params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Cost parameters are read back from the stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
