//! Password-based stream encryption.
//!
//! An encrypted stream has the following form:
//!
//! - salt (64 bytes) - random salt for key derivation
//! - IV (16 bytes) - random initialization vector
//! - ciphertext - AES-128 in OFB mode, same length as the plaintext
//!
//! The key is derived from the password and the salt with PBKDF2-HMAC-SHA256 (10000 iterations).
//! Salt and IV are generated for every stream, so encrypting the same data twice produces
//! different output.
//!
//! The stream carries no authentication tag. Decrypting with a wrong password or decrypting
//! corrupted data silently produces garbage; in a stash this usually surfaces as a
//! decompression error one layer up.

mod cipher;
mod io;

pub use cipher::{HEADER_LEN, IV_LEN, Password, SALT_LEN, derive_key};
pub use io::{DecryptingReader, EncryptingWriter};
