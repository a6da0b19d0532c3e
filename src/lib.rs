#![deny(missing_docs)]
//! Verification of HMAC signed HTTP requests.
//!
//! A client holding an API key and its shared secret signs each request by sending
//! a single header:
//!
//! ```text
//! Authorization: APIKey=<api key>,Signature=<base64 hmac-sha256>,Timestamp=<RFC 3339 timestamp>
//! ```
//!
//! The signature is the HMAC-SHA256 of the "string to sign": the method, host,
//! request URI (with query) and the timestamp exactly as sent, followed by the
//! values of any required headers sorted by header name. Each field is followed
//! by `\n`.
//!
//! The server looks up the secret for the API key, rejects timestamps more than
//! ten seconds in the future or older than the configured expiry, recomputes the
//! signature and compares it in constant time. Every failure results in a
//! `401 Unauthorized` carrying the reason.
//!
//! ## Features
//!
//! Client/server-specific implementations are gated by correspondingly named
//! features.
//!
//! | Crate / Feature name                              | Client/Server | Notes                                      |
//! | ------------------------------------------------- | ------------- | ------------------------------------------ |
//! | [reqwest](https://crates.io/crates/reqwest)       | Client        | Supports blocking and non-blocking requests. |
//! | [rouille](https://crates.io/crates/rouille)       | Server        | Provides the `hmac_auth` middleware.       |
//!
//! `http::Request` is supported on both sides without any feature.
//!
//! ## Example usage
//!
//! ```rust
//! use hmac_auth::mock_request::MockRequest;
//! use hmac_auth::*;
//! use http::Method;
//!
//! let signing = SigningConfig::new("My Key", "secret").with_headers(vec!["Content-Type"]);
//!
//! let req = MockRequest::new(Method::POST, "http://localhost:8080/items?page=2")
//!     .with_header("Content-Type", "application/json")
//!     .signed(&signing)
//!     .unwrap();
//!
//! let config = VerifyingConfig::new(SimpleSecretResolver::new(vec![("My Key", "secret")]))
//!     .with_required_headers(vec!["Content-Type"]);
//!
//! let credential = req.verify(&config).unwrap();
//! assert_eq!(credential.api_key(), "My Key");
//! ```

mod algorithm;
pub use algorithm::*;

/// Parsing of the `Authorization` header.
pub mod header;
pub use header::{Credential, Parameter, ParseError};

mod canonicalize;
pub use canonicalize::*;

mod timestamp;
pub use timestamp::*;

mod signing;
pub use signing::*;

mod verifying;
pub use verifying::*;

/// Module containing a mock request type which implements both
/// `ClientRequestLike` and `RequestLike` for testing.
pub mod mock_request;

#[cfg(feature = "reqwest")]
mod reqwest_impls;

#[cfg(feature = "rouille")]
mod rouille_impls;
#[cfg(feature = "rouille")]
pub use rouille_impls::*;
