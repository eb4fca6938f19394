use {
    aes::Aes128,
    anyhow::{Context as _, Result, format_err},
    ofb::{Ofb, cipher::KeyIvInit},
    pbkdf2::pbkdf2_hmac,
    rand::{TryRngCore, rngs::OsRng},
    sha2::Sha256,
    std::fmt,
};

pub type Aes128Ofb = Ofb<Aes128>;

/// Length of the random salt mixed into key derivation.
pub const SALT_LEN: usize = 64;
/// Length of the initialization vector (one AES block).
pub const IV_LEN: usize = 16;
/// Length of the plaintext header that starts every encrypted stream.
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN;

const KDF_ITERATIONS: u32 = 10_000;
const KEY_LEN: usize = 16;

/// Secret used to derive the encryption key of every stash.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Vec<u8>);

impl Password {
    #[must_use]
    #[inline]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<String> for Password {
    #[inline]
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&str> for Password {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for Password {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password").finish()
    }
}

/// `salt ‖ iv`, written in plaintext before the first ciphertext byte.
pub struct CipherHeader([u8; HEADER_LEN]);

impl CipherHeader {
    pub fn generate() -> Result<Self> {
        let mut bytes = [0; HEADER_LEN];
        let (salt, iv) = bytes.split_at_mut(SALT_LEN);
        OsRng
            .try_fill_bytes(salt)
            .context("failed to generate salt")?;
        OsRng.try_fill_bytes(iv).context("failed to generate IV")?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn cipher(&self, password: &Password) -> Result<Aes128Ofb> {
        let (salt, iv) = self.0.split_at(SALT_LEN);
        let key = derive_key(password, salt);
        Aes128Ofb::new_from_slices(&key, iv)
            .map_err(|err| format_err!("failed to construct cipher: {err}"))
    }
}

/// PBKDF2-HMAC-SHA256 with a fixed iteration count; the key is one AES-128 key long.
#[must_use]
#[inline]
pub fn derive_key(password: &Password, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut key);
    key
}
