//! Key cipher capability used to protect private keys at rest.
//!
//! Key derivation lives outside this crate. Records bind ciphertext to their
//! own id and creation time, so both must be fixed before a key is encrypted.

use time::OffsetDateTime;

/// Encrypts and decrypts private keys for a specific record.
pub trait KeyCipher: Send + Sync {
    /// Encrypt `plaintext` for the record identified by `record_id`.
    fn encrypt(
        &self,
        record_id: &str,
        created_at: OffsetDateTime,
        plaintext: &str,
    ) -> crate::Result<String>;

    /// Decrypt ciphertext previously produced by [`KeyCipher::encrypt`].
    fn decrypt(
        &self,
        record_id: &str,
        created_at: OffsetDateTime,
        ciphertext: &str,
    ) -> crate::Result<String>;
}
