// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use base64::{engine::general_purpose, Engine as _};
use ring::aead::{Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, AES_256_GCM};
use ring::pbkdf2::{self, derive};
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const PBKDF2_ROUNDS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(rounds) => rounds,
    None => panic!("PBKDF2 rounds must be non-zero"),
};

struct SingleNonceSequence([u8; NONCE_LEN]);

impl NonceSequence for SingleNonceSequence {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        Ok(Nonce::assume_unique_for_key(self.0))
    }
}

/// Seals a mailbox secret with the configured master password.
pub fn encrypt_string(plaintext: &str) -> MailSiftResult<String> {
    seal(&SETTINGS.mailsift_encrypt_password, plaintext)
        .map_err(|_| raise_error!("Failed to encrypt string.".into(), ErrorCode::InternalError))
}

pub fn decrypt_string(data: &str) -> MailSiftResult<String> {
    open(&SETTINGS.mailsift_encrypt_password, data).map_err(|_| {
        raise_error!(
            "Decryption failed, likely due to incorrect encryption key or corrupted data".into(),
            ErrorCode::MissingConfiguration
        )
    })
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ROUNDS,
        salt,
        password.as_bytes(),
        &mut key,
    );
    key
}

fn seal(password: &str, plaintext: &str) -> Result<String, ring::error::Unspecified> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)?;

    let key = derive_key(password, &salt);
    let unbound_key = ring::aead::UnboundKey::new(&AES_256_GCM, &key)?;
    let mut sealing_key = SealingKey::new(unbound_key, SingleNonceSequence(nonce_bytes));
    let mut in_out = plaintext.as_bytes().to_vec();
    sealing_key.seal_in_place_append_tag(Aad::empty(), &mut in_out)?;

    let mut result = Vec::with_capacity(SALT_LEN + NONCE_LEN + in_out.len());
    result.extend_from_slice(&salt);
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&in_out);
    Ok(general_purpose::URL_SAFE.encode(&result))
}

fn open(password: &str, data: &str) -> Result<String, ring::error::Unspecified> {
    let data = general_purpose::URL_SAFE
        .decode(data)
        .map_err(|_| ring::error::Unspecified)?;
    if data.len() < SALT_LEN + NONCE_LEN {
        return Err(ring::error::Unspecified);
    }
    let (salt, rest) = data.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    let nonce_bytes: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| ring::error::Unspecified)?;

    let key = derive_key(password, salt);
    let unbound_key = ring::aead::UnboundKey::new(&AES_256_GCM, &key)?;
    let mut opening_key = OpeningKey::new(unbound_key, SingleNonceSequence(nonce_bytes));
    let mut in_out = ciphertext.to_vec();
    let decrypted_bytes = opening_key.open_in_place(Aad::empty(), &mut in_out)?;
    String::from_utf8(decrypted_bytes.to_vec()).map_err(|_| ring::error::Unspecified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_then_open() {
        let sealed = seal("master-secret", "imap-app-password").unwrap();
        assert_ne!(sealed, "imap-app-password");
        assert_eq!(open("master-secret", &sealed).unwrap(), "imap-app-password");
    }

    #[test]
    fn test_open_with_wrong_password_fails() {
        let sealed = seal("master-secret", "imap-app-password").unwrap();
        assert!(open("another-secret", &sealed).is_err());
        assert!(open("master-secret", "not base64 !!").is_err());
    }
}
