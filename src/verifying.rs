use std::collections::{BTreeSet, HashMap};
use std::convert::TryFrom;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::header::AUTHORIZATION;
use http::{Response, StatusCode};
use thiserror::Error;

use crate::algorithm::{HmacSha256, HttpSignature};
use crate::canonicalize::{build_string_to_sign, CanonicalizeError, RequestLike};
use crate::header::{self, Credential, ParseError};
use crate::timestamp::{validate_timestamp_at, TimestampError};

/// The closed set of reasons for which verification, or construction of a
/// verifier, can fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The `Authorization` header, or a required signed header, is missing.
    MissingHeader,
    /// Unrecognised parameter in the `Authorization` header.
    InvalidParameter,
    /// A parameter appears more than once in the `Authorization` header.
    RepeatedParameter,
    /// The timestamp is not in RFC 3339 format.
    InvalidTimestamp,
    /// One of the API key, signature or timestamp is missing.
    MissingParameter,
    /// The timestamp is too far in the future.
    OutOfRange,
    /// The timestamp is older than the configured expiry.
    Expired,
    /// No secret is known for the API key.
    InvalidApiKey,
    /// The signature does not match the request.
    InvalidSignature,
    /// The verifier was constructed without a secret resolver.
    ConfigurationError,
}

/// This error indicates that we failed to verify the request. As a result
/// the request should be rejected with the status from `status_code()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum VerifyingError {
    /// The `Authorization` header could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The signed timestamp was rejected.
    #[error(transparent)]
    Timestamp(#[from] TimestampError),
    /// The string to sign could not be built for the request.
    #[error(transparent)]
    Canonicalize(#[from] CanonicalizeError),
    /// The secret resolver knows no secret for the API key.
    #[error("Invalid APIKey")]
    InvalidApiKey,
    /// The supplied signature does not match the expected signature.
    #[error("Invalid Signature")]
    InvalidSignature,
}

impl VerifyingError {
    /// Returns the kind of failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerifyingError::Parse(ParseError::MissingHeader) => ErrorKind::MissingHeader,
            VerifyingError::Parse(ParseError::InvalidParameter) => ErrorKind::InvalidParameter,
            VerifyingError::Parse(ParseError::RepeatedParameter(_)) => {
                ErrorKind::RepeatedParameter
            }
            VerifyingError::Parse(ParseError::InvalidTimestamp) => ErrorKind::InvalidTimestamp,
            VerifyingError::Parse(ParseError::MissingParameter) => ErrorKind::MissingParameter,
            VerifyingError::Timestamp(TimestampError::OutOfRange) => ErrorKind::OutOfRange,
            VerifyingError::Timestamp(TimestampError::Expired) => ErrorKind::Expired,
            VerifyingError::Canonicalize(CanonicalizeError::MissingHeader(_)) => {
                ErrorKind::MissingHeader
            }
            VerifyingError::InvalidApiKey => ErrorKind::InvalidApiKey,
            VerifyingError::InvalidSignature => ErrorKind::InvalidSignature,
        }
    }

    /// Every verification failure maps to `401 Unauthorized`.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    /// Render the failure as a response: the status from `status_code()` and the
    /// reason followed by a newline as the body. No headers are set.
    pub fn to_response(&self) -> Response<String> {
        let mut res = Response::new(format!("{}\n", self));
        *res.status_mut() = self.status_code();
        res
    }
}

/// Errors detected when constructing a `VerifyingConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No secret resolver was supplied.
    #[error("Secret resolver required")]
    MissingSecretResolver,
}

impl ConfigError {
    /// Returns the kind of failure.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ConfigurationError
    }
}

/// The verification process will use this trait to find the shared secret for
/// the API key presented by a request.
///
/// Any `Fn(&str) -> Option<String>` closure implements this trait. The
/// `SimpleSecretResolver` type provides an in-memory store that should be
/// suitable for many situations.
pub trait SecretResolver: Send + Sync + 'static {
    /// Returns the secret for `api_key`, or `None` if the key is unknown. An empty
    /// secret is treated the same as an unknown key.
    fn resolve(&self, api_key: &str) -> Option<String>;
}

impl<F> SecretResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync + 'static,
{
    fn resolve(&self, api_key: &str) -> Option<String> {
        self(api_key)
    }
}

/// Implementation of a simple in-memory secret store.
#[derive(Debug, Default, Clone)]
pub struct SimpleSecretResolver {
    secrets: HashMap<String, String>,
}

impl SimpleSecretResolver {
    /// Initializes the store from a list of API keys and secrets.
    pub fn new<I, K, S>(secret_iter: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<String>,
    {
        Self {
            secrets: secret_iter
                .into_iter()
                .map(|(api_key, secret)| (api_key.into(), secret.into()))
                .collect(),
        }
    }

    /// Adds a secret to the store, replacing any existing secret for the API key.
    pub fn add(&mut self, api_key: &str, secret: &str) {
        self.secrets.insert(api_key.into(), secret.into());
    }
    /// Clears all secrets from the store
    pub fn clear(&mut self) {
        self.secrets.clear();
    }
    /// Removes the secret for the specified API key
    pub fn remove(&mut self, api_key: &str) {
        self.secrets.remove(api_key);
    }
}

impl SecretResolver for SimpleSecretResolver {
    fn resolve(&self, api_key: &str) -> Option<String> {
        self.secrets.get(api_key).cloned()
    }
}

/// The raw configuration surface of a verifier. Convert it into a
/// `VerifyingConfig` with `VerifyingConfig::try_from`, which fails if no secret
/// resolver is set.
#[derive(Default)]
pub struct VerifyingOptions {
    /// Headers which must be present on every request and are covered by the
    /// signature. Order does not matter.
    pub required_headers: Vec<String>,
    /// Looks up the secret for an API key.
    pub secret_resolver: Option<Arc<dyn SecretResolver>>,
    /// Maximum age of a signature. `None` or zero disables expiration.
    pub expiry: Option<Duration>,
}

impl TryFrom<VerifyingOptions> for VerifyingConfig {
    type Error = ConfigError;

    fn try_from(options: VerifyingOptions) -> Result<Self, Self::Error> {
        let secret_resolver = options
            .secret_resolver
            .ok_or(ConfigError::MissingSecretResolver)?;
        Ok(VerifyingConfig {
            secret_resolver,
            required_headers: options.required_headers.into_iter().collect(),
            expiry: options.expiry,
        })
    }
}

/// The configuration used for verifying HTTP requests. It is immutable while
/// shared and can be used from many threads at once.
#[derive(Clone)]
pub struct VerifyingConfig {
    secret_resolver: Arc<dyn SecretResolver>,
    required_headers: BTreeSet<String>,
    expiry: Option<Duration>,
}

impl Debug for VerifyingConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VerifyingConfig")
            .field("required_headers", &self.required_headers)
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl VerifyingConfig {
    /// Creates a new verifying configuration using the given secret resolver, with
    /// no required headers and no expiry.
    pub fn new<SR: SecretResolver>(secret_resolver: SR) -> Self {
        VerifyingConfig {
            secret_resolver: Arc::new(secret_resolver),
            required_headers: BTreeSet::new(),
            expiry: None,
        }
    }

    /// Returns the secret resolver.
    pub fn secret_resolver(&self) -> &dyn SecretResolver {
        &*self.secret_resolver
    }
    /// Returns the headers that must be present on, and signed for, every request,
    /// in the order they appear in the string to sign.
    pub fn required_headers(&self) -> impl IntoIterator<Item = &str> {
        self.required_headers.iter().map(String::as_str)
    }
    /// Controls the headers that must be present on, and signed for, every request
    /// (in-place).
    pub fn set_required_headers<I, S>(&mut self, required_headers: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_headers = required_headers.into_iter().map(Into::into).collect();
        self
    }
    /// Controls the headers that must be present on, and signed for, every request.
    pub fn with_required_headers<I, S>(mut self, required_headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_required_headers(required_headers);
        self
    }
    /// Returns the maximum age of a signature.
    ///
    /// This is unset by default: signatures never expire.
    pub fn expiry(&self) -> Option<Duration> {
        self.expiry
    }
    /// Controls the maximum age of a signature (in-place). `None` or zero disables
    /// expiration.
    pub fn set_expiry(&mut self, expiry: Option<Duration>) -> &mut Self {
        self.expiry = expiry;
        self
    }
    /// Controls the maximum age of a signature. `None` or zero disables expiration.
    pub fn with_expiry(mut self, expiry: Option<Duration>) -> Self {
        self.set_expiry(expiry);
        self
    }
}

/// Import this trait to get access to the `verify` method on all types implementing
/// `RequestLike`.
pub trait VerifyingExt {
    /// Verify the request using the given verification configuration. On success,
    /// returns the credential the request was signed with.
    fn verify(&self, config: &VerifyingConfig) -> Result<Credential, VerifyingError> {
        self.verify_at(config, Utc::now())
    }

    /// Verify the request as if the current time were `now`.
    fn verify_at(
        &self,
        config: &VerifyingConfig,
        now: DateTime<Utc>,
    ) -> Result<Credential, VerifyingError>;
}

fn verify_credential<T: RequestLike + ?Sized>(
    req: &T,
    config: &VerifyingConfig,
    now: DateTime<Utc>,
) -> Result<Credential, VerifyingError> {
    let auth_header = match req.header(AUTHORIZATION.as_str()) {
        Some(value) => value,
        None => return Err(ParseError::MissingHeader.into()),
    };
    let auth_header = auth_header
        .to_str()
        .map_err(|_| ParseError::InvalidParameter)?;
    let credential = header::parse(auth_header)?;

    validate_timestamp_at(credential.timestamp(), now, config.expiry)?;

    let string_to_sign =
        build_string_to_sign(req, credential.timestamp_raw(), &config.required_headers)?;

    let secret = config
        .secret_resolver
        .resolve(credential.api_key())
        .filter(|secret| !secret.is_empty())
        .ok_or(VerifyingError::InvalidApiKey)?;

    // Constant time comparison
    if HmacSha256::new(secret.as_bytes())
        .http_verify(string_to_sign.as_bytes(), credential.signature())
    {
        Ok(credential)
    } else {
        Err(VerifyingError::InvalidSignature)
    }
}

impl<T: RequestLike> VerifyingExt for T {
    fn verify_at(
        &self,
        config: &VerifyingConfig,
        now: DateTime<Utc>,
    ) -> Result<Credential, VerifyingError> {
        match verify_credential(self, config, now) {
            Ok(credential) => {
                log::debug!(
                    "Verified {} {} for API key {:?}",
                    self.method(),
                    self.request_uri(),
                    credential.api_key()
                );
                Ok(credential)
            }
            Err(e) => {
                log::warn!(
                    "Rejected {} {}: {}",
                    self.method(),
                    self.request_uri(),
                    e
                );
                Err(e)
            }
        }
    }
}
