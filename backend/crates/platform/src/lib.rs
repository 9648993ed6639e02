//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations with no domain knowledge:
//! - Cryptographic utilities (SHA-256, secure random tokens, base64url)
//! - Password hashing (Argon2id) and password policy checks
//! - Request origin extraction (client IP, User-Agent)

pub mod client;
pub mod crypto;
pub mod password;
