/// Name of the cookie carrying the signed session token
pub const SESSION_COOKIE_NAME: &str = "sid";

/// Number of random bytes in a session token (hex-encoded to 64 chars)
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Longest accepted session lifetime (ten years)
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Fallback signing secret for local development only
pub const DEV_SESSION_SECRET: &str = "file-drop-dev-secret-change-me";

/// Multipart field that carries the uploaded file
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Maximum username length in characters
pub const MAX_USERNAME_LEN: usize = 64;

/// Maximum password length in bytes
pub const MAX_PASSWORD_LEN: usize = 1024;

/// Maximum length of an uploaded file's name
pub const MAX_FILENAME_LEN: usize = 255;

/// Page size used when listing a remote bucket
pub const BACKEND_LIST_LIMIT: usize = 1000;

// =============================================================================
// Response Messages
// =============================================================================

/// Message returned to the contact form on success
pub const MSG_CONTACT_RECEIVED: &str = "Message received!";

/// Shown on the listing page when the index is empty
pub const MSG_NO_UPLOADS: &str = "No files uploaded yet.";

/// Shown when login fails, for unknown users and wrong passwords alike
pub const ERR_INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Shown when signup picks a taken username
pub const ERR_USERNAME_TAKEN: &str = "User already exists";
