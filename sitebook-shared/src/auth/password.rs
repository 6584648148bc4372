/// Password hashing with Argon2id
///
/// Hashes are stored in PHC string format, which embeds the algorithm,
/// parameters and salt, so verification never needs the parameters below.
///
/// # Example
///
/// ```
/// use sitebook_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Scaffold#2026")?;
/// assert!(verify_password("Scaffold#2026", &hash)?);
/// assert!(!verify_password("scaffold#2026", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Memory cost in KiB (19 MiB, OWASP minimum for Argon2id)
const M_COST_KIB: u32 = 19_456;

/// Iterations
const T_COST: u32 = 2;

/// Parallel lanes
const P_COST: u32 = 1;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(M_COST_KIB)
        .t_cost(T_COST)
        .p_cost(P_COST)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password using Argon2id with a random 16-byte salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored hash
///
/// Returns `Ok(false)` for a wrong password and an error only when the stored
/// hash itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks the password policy for new accounts
///
/// At least 8 characters with a letter and a digit, no surrounding whitespace.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }

    if password.trim() != password {
        return Err("Password must not start or end with whitespace".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_phc() {
        let hash = hash_password("Framing-crew-7").expect("hash");
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=19456,t=2,p=1"));
    }

    #[test]
    fn test_hashes_use_distinct_salts() {
        let a = hash_password("same_password1").unwrap();
        let b = hash_password("same_password1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_correct_and_incorrect() {
        let hash = hash_password("Concrete42").unwrap();
        assert!(verify_password("Concrete42", &hash).unwrap());
        assert!(!verify_password("concrete42", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_invalid_hash() {
        assert!(matches!(
            verify_password("password", "not-a-hash"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password_strength("rebar2026").is_ok());
        assert!(validate_password_strength("Ab1").unwrap_err().contains("8 characters"));
        assert!(validate_password_strength("onlyletters").unwrap_err().contains("digit"));
        assert!(validate_password_strength("1234567890").unwrap_err().contains("letter"));
        assert!(validate_password_strength(" padded123").unwrap_err().contains("whitespace"));
    }
}
