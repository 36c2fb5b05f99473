pub mod encryption;

pub use encryption::{CryptoError, EncryptedField, EncryptionEngine};
