use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::constants::{CHANNEL_KEY_SIZE, KDF_CONTEXT_CHANNEL_KEY, NONCE_SIZE};
use crate::error::CryptoError;

pub type ChannelKey = [u8; CHANNEL_KEY_SIZE];

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

// BLAKE3 KDF, domain-separated per channel name
pub fn derive_channel_key(password: &str, channel: &str) -> ChannelKey {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_CHANNEL_KEY);
    hasher.update(channel.as_bytes());
    hasher.update(&[0u8]);
    hasher.update(password.as_bytes());
    let hash = hasher.finalize();
    let mut key = [0u8; CHANNEL_KEY_SIZE];
    key.copy_from_slice(&hash.as_bytes()[..CHANNEL_KEY_SIZE]);
    key
}

// Returns nonce || ciphertext, with the channel creator bound as associated data
pub fn encrypt_for_channel(
    key: &ChannelKey,
    plaintext: &str,
    creator: &str,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: creator.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

pub fn decrypt_from_channel(
    key: &ChannelKey,
    data: &[u8],
    creator: &str,
) -> Result<String, CryptoError> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: creator.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = derive_channel_key("secret", "#general");
        let encrypted = encrypt_for_channel(&key, "hello mesh", "a1b2c3d4").unwrap();
        let decrypted = decrypt_from_channel(&key, &encrypted, "a1b2c3d4").unwrap();

        assert_eq!(decrypted, "hello mesh");
    }

    #[test]
    fn test_wrong_password_fails() {
        let key = derive_channel_key("secret", "#general");
        let other = derive_channel_key("guess", "#general");

        let encrypted = encrypt_for_channel(&key, "hello", "owner").unwrap();
        assert_eq!(
            decrypt_from_channel(&other, &encrypted, "owner"),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_wrong_creator_fails() {
        let key = derive_channel_key("secret", "#general");
        let encrypted = encrypt_for_channel(&key, "hello", "owner").unwrap();

        assert!(decrypt_from_channel(&key, &encrypted, "impostor").is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = derive_channel_key("secret", "#general");
        let mut encrypted = encrypt_for_channel(&key, "important", "").unwrap();
        let len = encrypted.len();
        encrypted[len - 1] ^= 0xFF;

        assert!(decrypt_from_channel(&key, &encrypted, "").is_err());
    }

    #[test]
    fn test_short_data_fails() {
        let key = derive_channel_key("secret", "#general");
        assert!(decrypt_from_channel(&key, &[0u8; 10], "").is_err());
    }

    #[test]
    fn test_channel_key_derivation_deterministic() {
        assert_eq!(
            derive_channel_key("pw", "#rust"),
            derive_channel_key("pw", "#rust")
        );
    }

    #[test]
    fn test_same_password_different_channels() {
        assert_ne!(
            derive_channel_key("pw", "#rust"),
            derive_channel_key("pw", "#go")
        );
    }
}
