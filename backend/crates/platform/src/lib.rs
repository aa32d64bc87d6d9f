//! Platform Crate - Technical Infrastructure
//!
//! Security primitives shared by the backend crates:
//! - Cryptographic utilities (random tokens, HMAC-SHA256, Base64url)
//! - Cookie building and parsing
//! - Credential hashing (bcrypt over NFKC-normalized input)
//! - Password strength policy
//! - CSRF double-submit-cookie tokens

pub mod cookie;
pub mod crypto;
pub mod csrf;
pub mod password;
pub mod password_policy;
