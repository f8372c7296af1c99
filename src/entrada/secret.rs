//! Random passwords for directory accounts.

use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use thiserror::Error;

pub const SECRET_LENGTH: usize = 16;

pub const CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_=+";

// Bytes at or above this would bias the modulo toward the front of CHARSET.
const ACCEPT_BELOW: usize = 256 / CHARSET.len() * CHARSET.len();

#[derive(Debug, Error)]
#[error("random source unavailable: {0}")]
pub struct RandomSourceUnavailable(#[from] rand::Error);

/// Generate a password from the operating system CSPRNG.
///
/// # Errors
/// Returns an error if the entropy source fails; callers must not fall back.
pub fn generate() -> Result<SecretString, RandomSourceUnavailable> {
    generate_with(&mut OsRng)
}

/// # Errors
/// Returns an error if `rng` fails to produce bytes.
pub fn generate_with<R: RngCore + ?Sized>(
    rng: &mut R,
) -> Result<SecretString, RandomSourceUnavailable> {
    let mut secret = String::with_capacity(SECRET_LENGTH);
    let mut buf = [0u8; 32];

    while secret.len() < SECRET_LENGTH {
        rng.try_fill_bytes(&mut buf)?;

        for byte in buf.iter().map(|&b| usize::from(b)) {
            if byte >= ACCEPT_BELOW {
                continue;
            }
            secret.push(char::from(CHARSET[byte % CHARSET.len()]));
            if secret.len() == SECRET_LENGTH {
                break;
            }
        }
    }

    buf.fill(0);

    Ok(SecretString::from(secret))
}
