use std::collections::BTreeSet;
use std::convert::TryFrom;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use thiserror::Error;

use crate::algorithm::{HmacSha256, HttpSignature};
use crate::canonicalize::{build_string_to_sign, CanonicalizeError, RequestLike};

/// This trait is to be implemented for types representing an outgoing
/// HTTP request. The HTTP signing extension methods are available on
/// any type implementing this trait.
pub trait ClientRequestLike: RequestLike {
    /// Add or replace a header on the request.
    fn set_header(&mut self, header: HeaderName, value: HeaderValue);
}

impl<B> ClientRequestLike for http::Request<B> {
    fn set_header(&mut self, header: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(header, value);
    }
}

/// The types of error which may occur whilst signing a request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SigningError {
    /// The string to sign could not be built, usually because a required header
    /// is missing from the request.
    #[error(transparent)]
    Canonicalize(#[from] CanonicalizeError),
    /// The API key is empty, or cannot be carried in the `Authorization` header.
    #[error("Invalid APIKey")]
    InvalidApiKey,
}

/// The configuration used for signing HTTP requests.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    signature: Arc<dyn HttpSignature>,
    api_key: String,
    headers: BTreeSet<String>,
}

impl SigningConfig {
    /// Creates a new signing configuration for the given API key and its shared
    /// secret, signing no headers beyond the fixed fields.
    pub fn new(api_key: &str, secret: &str) -> Self {
        SigningConfig {
            signature: Arc::new(HmacSha256::new(secret.as_bytes())),
            api_key: api_key.into(),
            headers: BTreeSet::new(),
        }
    }

    /// Returns the API key.
    pub fn api_key(&self) -> &str {
        self.api_key.as_ref()
    }
    /// Returns the headers whose values are included in the signature.
    pub fn headers(&self) -> impl IntoIterator<Item = &str> {
        self.headers.iter().map(String::as_str)
    }
    /// Controls the headers whose values are included in the signature (in-place).
    /// These must match the verifier's required headers.
    pub fn set_headers<I, S>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }
    /// Controls the headers whose values are included in the signature.
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_headers(headers);
        self
    }
}

/// Import this trait to get access to the `sign` methods on all types
/// implementing `ClientRequestLike`.
pub trait SigningExt: Sized {
    /// Consumes the request and returns it signed.
    fn signed(mut self, config: &SigningConfig) -> Result<Self, SigningError> {
        self.sign(config)?;
        Ok(self)
    }

    /// Signs the request in-place with the current time.
    fn sign(&mut self, config: &SigningConfig) -> Result<(), SigningError> {
        self.sign_at(config, Utc::now())
    }

    /// Signs the request in-place, stamping it with `timestamp`.
    fn sign_at(
        &mut self,
        config: &SigningConfig,
        timestamp: DateTime<Utc>,
    ) -> Result<(), SigningError>;
}

impl<R: ClientRequestLike> SigningExt for R {
    fn sign_at(
        &mut self,
        config: &SigningConfig,
        timestamp: DateTime<Utc>,
    ) -> Result<(), SigningError> {
        // The header format has no escaping, so a comma would split the key
        if config.api_key.is_empty() || config.api_key.contains(',') {
            return Err(SigningError::InvalidApiKey);
        }

        let timestamp = timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        let string_to_sign = build_string_to_sign(&*self, &timestamp, &config.headers)?;
        let signature = config.signature.http_sign(string_to_sign.as_bytes());

        let auth_header = format!(
            "APIKey={},Signature={},Timestamp={}",
            config.api_key, signature, timestamp
        );
        let auth_header =
            HeaderValue::try_from(auth_header).map_err(|_| SigningError::InvalidApiKey)?;
        self.set_header(AUTHORIZATION, auth_header);

        Ok(())
    }
}
