use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use ring::{aead, pbkdf2, rand::{SecureRandom, SystemRandom}};
use std::num::NonZeroU32;

const APP_SECRET: &[u8] = b"invoice-dash-session-v1";
const PBKDF2_ITERATIONS: u32 = 100_000;
const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;
const PREFIX: &str = "enc";

/// Encrypts session tokens before they are written to disk.
pub struct CryptoService;

impl CryptoService {
    pub fn encrypt_token(token: &str) -> Result<String> {
        let rng = SystemRandom::new();
        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt)
            .map_err(|_| anyhow!("Failed to generate salt"))?;

        let key = derive_key(&salt)?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes)
            .map_err(|_| anyhow!("Failed to generate nonce"))?;

        let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);
        let mut in_out = token.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| anyhow!("Encryption failed"))?;

        Ok(format!(
            "{}:{}:{}:{}",
            PREFIX,
            general_purpose::STANDARD.encode(salt),
            general_purpose::STANDARD.encode(nonce_bytes),
            general_purpose::STANDARD.encode(in_out)
        ))
    }

    pub fn decrypt_token(payload: &str) -> Result<String> {
        let parts: Vec<&str> = payload.split(':').collect();
        if parts.len() != 4 || parts[0] != PREFIX {
            return Err(anyhow!("Invalid encrypted payload"));
        }
        let salt = general_purpose::STANDARD
            .decode(parts[1])
            .map_err(|e| anyhow!("Decode salt: {}", e))?;
        let nonce_bytes = general_purpose::STANDARD
            .decode(parts[2])
            .map_err(|e| anyhow!("Decode nonce: {}", e))?;
        let mut data = general_purpose::STANDARD
            .decode(parts[3])
            .map_err(|e| anyhow!("Decode ciphertext: {}", e))?;

        let key = derive_key(&salt)?;
        let nonce = aead::Nonce::assume_unique_for_key(
            nonce_bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow!("Invalid nonce length"))?,
        );

        let decrypted = key
            .open_in_place(nonce, aead::Aad::empty(), &mut data)
            .map_err(|_| anyhow!("Decryption failed"))?;
        Ok(String::from_utf8(decrypted.to_vec())?)
    }
}

fn derive_key(salt: &[u8]) -> Result<aead::LessSafeKey> {
    let mut key_bytes = [0u8; 32];
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS).ok_or_else(|| anyhow!("Invalid iterations"))?;
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        APP_SECRET,
        &mut key_bytes,
    );
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key_bytes)
        .map_err(|_| anyhow!("Invalid key material"))?;
    Ok(aead::LessSafeKey::new(unbound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_survives_encryption() {
        let sealed = CryptoService::encrypt_token("eyJhbGciOi.payload.sig").unwrap();
        assert!(sealed.starts_with("enc:"));
        assert!(!sealed.contains("payload"));
        assert_eq!(
            CryptoService::decrypt_token(&sealed).unwrap(),
            "eyJhbGciOi.payload.sig"
        );
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let sealed = CryptoService::encrypt_token("secret").unwrap();
        let mut parts: Vec<String> = sealed.split(':').map(str::to_string).collect();
        let mut bytes = general_purpose::STANDARD.decode(&parts[3]).unwrap();
        bytes[0] ^= 0xff;
        parts[3] = general_purpose::STANDARD.encode(bytes);

        assert!(CryptoService::decrypt_token(&parts.join(":")).is_err());
        assert!(CryptoService::decrypt_token("plain-token").is_err());
    }
}
