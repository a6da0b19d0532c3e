use http::header::{HeaderName, HeaderValue, HOST};
use thiserror::Error;

/// The types of error which may occur whilst computing the canonical "string to sign"
/// for a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CanonicalizeError {
    /// A header required to be part of the signature was absent or empty.
    #[error("Missing required header: \"{0}\"")]
    MissingHeader(String),
}

/// Base trait for all request types. Implementations provide read-only access to
/// the parts of a request that are covered by the signature.
pub trait RequestLike {
    /// The request method, exactly as received.
    fn method(&self) -> &str;

    /// The request host, in the form `<host>` or `<host>:<port>`.
    fn host(&self) -> Option<String>;

    /// The request path including the query string, exactly as presented on the
    /// wire.
    fn request_uri(&self) -> String;

    /// Returns an existing header on the request, looked up case-insensitively by
    /// name. Implementations should not try to "guess" the value for missing headers.
    fn header(&self, name: &str) -> Option<HeaderValue>;
}

impl<T: RequestLike + ?Sized> RequestLike for &T {
    fn method(&self) -> &str {
        (**self).method()
    }
    fn host(&self) -> Option<String> {
        (**self).host()
    }
    fn request_uri(&self) -> String {
        (**self).request_uri()
    }
    fn header(&self, name: &str) -> Option<HeaderValue> {
        (**self).header(name)
    }
}

impl<B> RequestLike for http::Request<B> {
    fn method(&self) -> &str {
        http::Request::method(self).as_str()
    }
    fn host(&self) -> Option<String> {
        if let Some(host) = self.headers().get(HOST).and_then(|v| v.to_str().ok()) {
            return Some(host.into());
        }
        // Same form as the `Host` header: no userinfo
        self.uri().host().map(|host| match self.uri().port_u16() {
            Some(port) => format!("{}:{}", host, port),
            None => host.into(),
        })
    }
    fn request_uri(&self) -> String {
        self.uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str())
            .into()
    }
    fn header(&self, name: &str) -> Option<HeaderValue> {
        let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
        self.headers().get(name).cloned()
    }
}

/// Opaque struct storing a computed string to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureString {
    content: Vec<u8>,
}

impl SignatureString {
    /// Obtain a view of this string to sign as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }
}

impl From<SignatureString> for Vec<u8> {
    fn from(other: SignatureString) -> Self {
        other.content
    }
}

/// Build the canonical string to sign for a request.
///
/// The string consists of the method, host, request URI and raw timestamp,
/// followed by the value of each required header with the headers sorted by
/// name. Every field is terminated by `\n`.
///
/// Values are not escaped: a header value containing `\n` makes the result
/// ambiguous.
pub fn build_string_to_sign<R, I, S>(
    req: &R,
    timestamp_raw: &str,
    required_headers: I,
) -> Result<SignatureString, CanonicalizeError>
where
    R: RequestLike + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut required_headers: Vec<S> = required_headers.into_iter().collect();
    required_headers.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));

    let host = req.host().unwrap_or_default();
    let request_uri = req.request_uri();

    let mut content = Vec::new();
    for field in &[req.method(), host.as_str(), request_uri.as_str(), timestamp_raw] {
        content.extend(field.as_bytes());
        content.push(b'\n');
    }

    for name in &required_headers {
        let name = name.as_ref();
        let value = req
            .header(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CanonicalizeError::MissingHeader(name.into()))?;
        content.extend(value.as_bytes());
        content.push(b'\n');
    }

    Ok(SignatureString { content })
}

/// Extension method for computing the canonical string to sign of a request.
pub trait CanonicalizeExt {
    /// Compute the canonical representation of this request
    fn canonicalize<I, S>(
        &self,
        timestamp_raw: &str,
        required_headers: I,
    ) -> Result<SignatureString, CanonicalizeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>;
}

impl<T: RequestLike> CanonicalizeExt for T {
    fn canonicalize<I, S>(
        &self,
        timestamp_raw: &str,
        required_headers: I,
    ) -> Result<SignatureString, CanonicalizeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        build_string_to_sign(self, timestamp_raw, required_headers)
    }
}
