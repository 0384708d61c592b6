//! Sealed-box encryption for secrets exchanged with the scheduler.
//!
//! Wraps the libsodium-compatible `crypto_box_seal` construction from the
//! `crypto_box` crate: X25519 key agreement with a fresh ephemeral keypair
//! per message, XSalsa20-Poly1305 for the payload, and a nonce derived from
//! both public keys. Ciphertexts interoperate with libsodium and `PyNaCl`.
//!
//! # Formats
//!
//! - Key files hold standard padded base64 of exactly 32 raw bytes. ASCII
//!   whitespace anywhere in the file is ignored.
//! - Ciphertext: `ephemeral_pk (32 bytes) || box (plaintext + 16-byte tag)`.

use std::fmt;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use crypto_box::aead::OsRng;
use zeroize::Zeroizing;

use crate::error::{CryptoError, KeyFormatError};

/// Raw length of both public and private keys.
pub const KEY_LEN: usize = 32;

/// Bytes added to every plaintext: ephemeral public key plus Poly1305 tag.
pub const SEAL_OVERHEAD: usize = KEY_LEN + 16;

/// A recipient's X25519 public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(crypto_box::PublicKey);

impl PublicKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(crypto_box::PublicKey::from(bytes))
    }

    /// Borrow the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        self.0.as_bytes()
    }

    /// Standard padded base64 of the raw key, as stored in key files.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.as_bytes())
    }
}

/// A recipient's X25519 private key. Zeroized on drop.
pub struct PrivateKey(crypto_box::SecretKey);

impl PrivateKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(crypto_box::SecretKey::from(bytes))
    }

    /// Generate a new random key using the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self(crypto_box::SecretKey::generate(&mut OsRng))
    }

    /// The matching public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    /// Standard padded base64 of the raw key.
    ///
    /// The caller must not log the returned string.
    #[must_use]
    pub fn to_base64(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.0.to_bytes());
        Zeroizing::new(STANDARD.encode(bytes.as_slice()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Decode base64 key material to exactly [`KEY_LEN`] bytes.
fn decode_key(data: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, KeyFormatError> {
    let compact: Zeroizing<Vec<u8>> = Zeroizing::new(
        data.iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect(),
    );
    let decoded = Zeroizing::new(STANDARD.decode(compact.as_slice()).map_err(|e| {
        KeyFormatError::InvalidBase64 {
            reason: e.to_string(),
        }
    })?);
    let bytes: [u8; KEY_LEN] =
        decoded
            .as_slice()
            .try_into()
            .map_err(|_| KeyFormatError::InvalidLength {
                expected: KEY_LEN,
                actual: decoded.len(),
            })?;
    Ok(Zeroizing::new(bytes))
}

/// Load a public key from raw key-file bytes.
///
/// # Errors
///
/// Returns [`KeyFormatError`] if the content is not base64 or does not
/// decode to exactly 32 bytes.
pub fn load_public_key(data: &[u8]) -> Result<PublicKey, KeyFormatError> {
    let bytes = decode_key(data)?;
    Ok(PublicKey::from_bytes(*bytes))
}

/// Load a private key from raw key-file bytes.
///
/// # Errors
///
/// Returns [`KeyFormatError`] if the content is not base64 or does not
/// decode to exactly 32 bytes.
pub fn load_private_key(data: &[u8]) -> Result<PrivateKey, KeyFormatError> {
    let bytes = decode_key(data)?;
    Ok(PrivateKey::from_bytes(*bytes))
}

/// Read and decode a public key file.
///
/// # Errors
///
/// Returns [`KeyFormatError::Io`] if the file cannot be read, otherwise as
/// [`load_public_key`].
pub fn read_public_key_file(path: &Path) -> Result<PublicKey, KeyFormatError> {
    let data = read_key_file(path)?;
    load_public_key(&data)
}

/// Read and decode a private key file.
///
/// # Errors
///
/// Returns [`KeyFormatError::Io`] if the file cannot be read, otherwise as
/// [`load_private_key`].
pub fn read_private_key_file(path: &Path) -> Result<PrivateKey, KeyFormatError> {
    let data = read_key_file(path)?;
    load_private_key(&data)
}

fn read_key_file(path: &Path) -> Result<Zeroizing<Vec<u8>>, KeyFormatError> {
    std::fs::read(path)
        .map(Zeroizing::new)
        .map_err(|e| KeyFormatError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Encrypt `plaintext` so only the holder of the matching private key can
/// read it. The sender is anonymous.
///
/// Output is `plaintext.len() + SEAL_OVERHEAD` bytes and differs on every
/// call.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the cipher fails.
pub fn sealed_box_encrypt(public_key: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    public_key
        .0
        .seal(&mut OsRng, plaintext)
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })
}

/// Decrypt a ciphertext produced by [`sealed_box_encrypt`].
///
/// No plaintext is returned unless the whole ciphertext authenticates.
///
/// # Errors
///
/// Returns [`CryptoError::Decryption`] for input shorter than
/// [`SEAL_OVERHEAD`] or if authentication fails (wrong key, corrupted, or
/// tampered ciphertext).
pub fn sealed_box_decrypt(private_key: &PrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < SEAL_OVERHEAD {
        return Err(CryptoError::Decryption {
            reason: format!(
                "ciphertext too short: expected at least {SEAL_OVERHEAD} bytes, got {}",
                ciphertext.len()
            ),
        });
    }
    private_key
        .0
        .unseal(ciphertext)
        .map_err(|e| CryptoError::Decryption {
            reason: e.to_string(),
        })
}
