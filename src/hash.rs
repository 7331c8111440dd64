use sha2::{Digest, Sha256};

/// One-way transform applied to the sensitive column before it is stored.
pub trait OneWayHash: Send + Sync {
    fn hash(&self, plaintext: &str) -> String;
}

/// Salted SHA-256, rendered as `sha256$<salt>$<hex digest>`.
#[derive(Debug, Clone, Default)]
pub struct Sha256Hash {
    salt: String,
}

impl Sha256Hash {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl OneWayHash for Sha256Hash {
    fn hash(&self, plaintext: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(plaintext.as_bytes());
        format!("sha256${}${:x}", self.salt, hasher.finalize())
    }
}
