//! # teamcal Crypto
//!
//! Authenticated field encryption and the two-level key hierarchy that
//! protects private calendar events.
//!
//! ## Key Hierarchy
//!
//! 1. **Master Key**: one per process, loaded from `SYSTEM_MASTER_KEY` at
//!    startup. Only ever used to envelope user keys.
//! 2. **User Key**: 256 random bits generated at registration, stored only in
//!    enveloped form and unveiled transiently for a single operation.
//!
//! Rotating the master key only requires re-enveloping the small user-key
//! blobs, not re-encrypting event content.
//!
//! ## Record Format
//!
//! Every ciphertext (key envelopes and event payloads alike) is persisted as
//!
//! ```text
//! <ivHex>:<authTagHex>:<ciphertextHex>
//! ```
//!
//! with a 12-byte AES-256-GCM nonce and a 16-byte tag. See [`SealedRecord`].
//!
//! ## Usage
//!
//! ```rust
//! use teamcal_crypto::{KeyEnvelope, MasterKey};
//!
//! let envelope = KeyEnvelope::new(MasterKey::generate());
//!
//! let user_key = KeyEnvelope::generate_user_key();
//! let stored = envelope.envelope(&user_key).unwrap();
//!
//! let sealed = teamcal_crypto::seal(b"checkup", user_key.as_bytes()).unwrap();
//! let unveiled = envelope.unveil(&stored).unwrap();
//! let plaintext = teamcal_crypto::open(&sealed, unveiled.as_bytes()).unwrap();
//! assert_eq!(plaintext, b"checkup");
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod keys;

pub use codec::{open, seal, SealedRecord, NONCE_LEN, SEPARATOR, TAG_LEN};
pub use envelope::KeyEnvelope;
pub use error::{CryptoError, Result};
pub use keys::{MasterKey, UserKey, KEY_LEN, MASTER_KEY_ENV};
