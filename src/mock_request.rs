use std::io::{BufRead, Write};

use anyhow::{anyhow, Context};
use http::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use http::Method;
use url::Url;

use crate::{ClientRequestLike, RequestLike};

/// A mock request type
#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl MockRequest {
    /// Returns the method used by this mock request
    pub fn method(&self) -> Method {
        self.method.clone()
    }
    /// Returns the path and query used by this mock request
    pub fn path(&self) -> &str {
        &self.path
    }
    /// Returns the headers used by this mock request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
    /// Returns the body used by this mock request
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Constructs a new mock request from an absolute URL. The `Host` header is
    /// set from the URL.
    ///
    /// Panics if the URL is not valid.
    pub fn new(method: Method, url: &str) -> Self {
        let url: Url = url.parse().expect("valid URL");

        let path = if let Some(query) = url.query() {
            format!("{}?{}", url.path(), query)
        } else {
            url.path().into()
        };
        let mut res = Self {
            method,
            path,
            headers: HeaderMap::new(),
            body: None,
        };
        if let Some(host) = url.host_str() {
            let host = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.into(),
            };
            res = res.with_header("Host", &host)
        }
        res
    }
    /// Convenience method for setting a header
    ///
    /// Panics if the name or value is not valid in a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(
            HeaderName::from_bytes(name.as_bytes()).expect("valid header name"),
            HeaderValue::from_bytes(value.as_bytes()).expect("valid header value"),
        );
        self
    }
    /// Method for setting a request body
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        let l = body.len();
        self.body = Some(body);
        self.with_header("Content-Length", &l.to_string())
    }

    /// Parse a HTTP request into this mock request object. The request target is
    /// kept verbatim.
    pub fn from_reader<R: BufRead>(reader: &mut R) -> anyhow::Result<Self> {
        let mut line = String::new();

        // Request line
        reader.read_line(&mut line)?;
        let mut parts = line.split_ascii_whitespace();
        let method: Method = parts
            .next()
            .ok_or_else(|| anyhow!("Malformed HTTP request: missing method"))?
            .parse()?;
        let path = parts
            .next()
            .ok_or_else(|| anyhow!("Malformed HTTP request: missing request target"))?
            .to_owned();

        // Headers, until a blank line or the end of input
        let mut headers = HeaderMap::new();
        let has_body = loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break false;
            }
            if line.trim().is_empty() {
                break true;
            }

            let mut parts = line.splitn(2, ':');
            let name_str = parts.next().unwrap_or_default().trim();
            let value_str = parts
                .next()
                .ok_or_else(|| anyhow!("Malformed HTTP header: {:?}", line.trim_end()))?
                .trim();
            let header_name: HeaderName = name_str
                .parse()
                .with_context(|| format!("{:?}", name_str))?;
            let header_value: HeaderValue = value_str
                .parse()
                .with_context(|| format!("{:?}", value_str))?;
            headers.append(header_name, header_value);
        };

        let body = if has_body {
            let mut body = Vec::new();
            reader.read_to_end(&mut body)?;
            Some(body)
        } else {
            None
        };

        Ok(Self {
            method,
            path,
            headers,
            body,
        })
    }

    /// Write out this HTTP request in standard format
    pub fn write<W: Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        writeln!(writer, "{} {} HTTP/1.1", self.method.as_str(), self.path)?;
        for (header_name, header_value) in &self.headers {
            writeln!(
                writer,
                "{}: {}",
                header_name.as_str(),
                header_value.to_str()?
            )?;
        }

        if let Some(body) = &self.body {
            writeln!(writer)?;
            writer.write_all(body)?;
        }

        Ok(())
    }
}

impl RequestLike for MockRequest {
    fn method(&self) -> &str {
        self.method.as_str()
    }
    fn host(&self) -> Option<String> {
        self.headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(Into::into)
    }
    fn request_uri(&self) -> String {
        self.path.clone()
    }
    fn header(&self, name: &str) -> Option<HeaderValue> {
        let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
        self.headers.get(name).cloned()
    }
}

impl ClientRequestLike for MockRequest {
    fn set_header(&mut self, header: HeaderName, value: HeaderValue) {
        self.headers.insert(header, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use chrono::{SecondsFormat, Utc};

    use crate::{
        sign, ErrorKind, SigningConfig, SigningExt, SimpleSecretResolver, VerifyingConfig,
        VerifyingExt,
    };

    fn test_request() -> MockRequest {
        MockRequest::new(
            Method::GET,
            "http://testhost.test/some/path?key=value&more=stuff",
        )
        .with_header("X-Test1", "12345678")
        .with_header("X-Test2", "87654321")
    }

    fn test_config() -> VerifyingConfig {
        VerifyingConfig::new(SimpleSecretResolver::new(vec![("12345678", "secret")]))
    }

    #[test]
    fn host_and_path_from_url() {
        let req = MockRequest::new(Method::POST, "http://localhost:8080/foo?a=b");
        assert_eq!(RequestLike::method(&req), "POST");
        assert_eq!(req.host().as_deref(), Some("localhost:8080"));
        assert_eq!(req.request_uri(), "/foo?a=b");
    }

    #[test]
    fn hand_signed_request_verifies() {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let signature = sign(
            &format!(
                "GET\ntesthost.test\n/some/path?key=value&more=stuff\n{}\n",
                timestamp
            ),
            "secret",
        );
        let req = test_request().with_header(
            "Authorization",
            &format!(
                "APIKey=12345678,Signature={},Timestamp={}",
                signature, timestamp
            ),
        );

        req.verify(&test_config())
            .expect("Signature to be verified correctly");

        // Changing a signed field invalidates the signature
        let req = req.with_header("Host", "othertest.test");
        assert_eq!(
            req.verify(&test_config()).unwrap_err().kind(),
            ErrorKind::InvalidSignature
        );
    }

    #[test]
    fn signed_with_required_headers() {
        let signing =
            SigningConfig::new("12345678", "secret").with_headers(vec!["X-Test1", "X-Test2"]);
        let req = test_request().signed(&signing).unwrap();

        let config = test_config().with_required_headers(vec!["X-Test2", "X-Test1"]);
        req.verify(&config)
            .expect("Signature to be verified correctly");

        // A changed header value invalidates the signature
        let tampered = req.clone().with_header("X-Test2", "00000000");
        assert_eq!(
            tampered.verify(&config).unwrap_err().kind(),
            ErrorKind::InvalidSignature
        );

        // Headers which are not required are not covered by the signature
        let extra = req.with_header("X-Other", "anything");
        assert!(extra.verify(&config).is_ok());
    }

    #[test]
    fn python_client_timestamp_format() {
        // `datetime.utcnow().isoformat() + "-00:00"`
        let timestamp = format!("{}-00:00", Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f"));
        let signature = sign(
            &format!(
                "GET\ntesthost.test\n/some/path?key=value&more=stuff\n{}\n",
                timestamp
            ),
            "secret",
        );
        let req = test_request().with_header(
            "Authorization",
            &format!(
                "APIKey=12345678,Signature={},Timestamp={}",
                signature, timestamp
            ),
        );

        req.verify(&test_config())
            .expect("Signature to be verified correctly");
    }

    #[test]
    fn from_reader_and_write() {
        let raw = "POST /foo?param=value&pet=dog HTTP/1.1\n\
                   Host: example.com\n\
                   Content-Type: application/json\n\
                   X-Multi: a\n\
                   X-Multi: b\n\
                   \n\
                   {\"hello\": \"world\"}";
        let req = MockRequest::from_reader(&mut Cursor::new(raw)).unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.path(), "/foo?param=value&pet=dog");
        assert_eq!(req.host().as_deref(), Some("example.com"));
        assert_eq!(req.headers().get_all("x-multi").iter().count(), 2);
        assert_eq!(req.header("X-Multi").unwrap(), "a");
        assert_eq!(req.body(), Some(&b"{\"hello\": \"world\"}"[..]));

        let mut out = Vec::new();
        req.write(&mut out).unwrap();
        let reparsed = MockRequest::from_reader(&mut Cursor::new(out)).unwrap();
        assert_eq!(reparsed, req);
    }

    #[test]
    fn from_reader_without_body() {
        let req =
            MockRequest::from_reader(&mut Cursor::new("GET / HTTP/1.1\nHost: h\n")).unwrap();
        assert_eq!(req.body(), None);
        assert_eq!(req.request_uri(), "/");
    }

    #[test]
    fn from_reader_rejects_garbage() {
        assert!(MockRequest::from_reader(&mut Cursor::new("")).is_err());
        assert!(MockRequest::from_reader(&mut Cursor::new("GET\n")).is_err());
        assert!(
            MockRequest::from_reader(&mut Cursor::new("GET / HTTP/1.1\nno colon here\n"))
                .is_err()
        );
    }
}
