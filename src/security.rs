use std::sync::OnceLock;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use hmac::{digest::InvalidLength, Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::constants::{MAX_FILENAME_LEN, SESSION_TOKEN_BYTES};

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Password Hashing
// =============================================================================

/// Hash a password with Argon2id and a fresh random salt
///
/// Returns the PHC string form, which embeds the algorithm, parameters and salt,
/// so verification needs nothing but the stored string.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)?;

    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string
///
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!("Unparseable password hash in credential store: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Run a verification against a throwaway hash
///
/// Used for unknown usernames so that login takes the same time whether or not
/// the account exists.
pub fn dummy_verify(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    let hash = DUMMY_HASH.get_or_init(|| hash_password("not-a-real-password").ok());
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
}

// =============================================================================
// Session Tokens
// =============================================================================

/// Generate an opaque session token (hex, 64 chars)
pub fn generate_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Check that a token has the shape `generate_token` produces
///
/// Tokens double as file names in the file session store, so anything else is
/// rejected before it reaches the filesystem.
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == SESSION_TOKEN_BYTES * 2 && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Produce the cookie value `<token>.<hex hmac>`
pub fn sign_token(token: &str, secret: &str) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(token.as_bytes());
    Ok(format!("{}.{}", token, hex::encode(mac.finalize().into_bytes())))
}

/// Split a signed cookie value and return the token if the signature matches
pub fn verify_signed_token<'a>(value: &'a str, secret: &str) -> Option<&'a str> {
    let (token, signature) = value.rsplit_once('.')?;
    if verify_hmac(token, signature, secret) {
        Some(token)
    } else {
        tracing::debug!("Session cookie with bad signature");
        None
    }
}

/// Verify HMAC-SHA256 signature
pub fn verify_hmac(data: &str, signature: &str, secret: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            tracing::error!("Failed to create HMAC instance");
            return false;
        }
    };

    mac.update(data.as_bytes());

    let sig_bytes = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    // Constant-time comparison
    mac.verify_slice(&sig_bytes).is_ok()
}

// =============================================================================
// Filenames
// =============================================================================

/// Reduce an uploaded filename to something safe to store under
///
/// Keeps only the final path component. Returns `None` for names that are
/// empty, hidden (leading dot), too long, or contain control characters.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();

    if name.is_empty()
        || name.starts_with('.')
        || name.len() > MAX_FILENAME_LEN
        || name.chars().any(|c| c.is_control())
    {
        return None;
    }

    Some(name.to_string())
}
