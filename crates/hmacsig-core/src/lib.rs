//! Configuration types shared across hmacsig.
//!
//! The signer needs a [`SigningConfig`] plus already-resolved
//! [`SigningCredentials`]; the verifier needs a [`VerifierConfig`] naming the
//! secret-retrieval endpoint. All three can be built in code (via their
//! builders) or loaded from environment variables.

mod config;
mod error;

pub use config::{
    DEFAULT_ABBR, DEFAULT_ORG, SigningConfig, SigningCredentials, VerifierConfig,
};
pub use error::{ConfigError, ConfigResult};
