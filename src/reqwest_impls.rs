use http::header::{HeaderName, HeaderValue, HOST};

use super::*;

/// Returns the correct `Host` header value for a given URL, in the form `<host>:<port>`.
fn host_from_url(url: &url::Url) -> Option<String> {
    url.host_str().map(|host| match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.into(),
    })
}

/// Path and query of a URL, as sent on the request line.
fn request_uri_from_url(url: &url::Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().into(),
    }
}

fn header_from_map(headers: &http::HeaderMap, name: &str) -> Option<HeaderValue> {
    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
    headers.get(name).cloned()
}

impl RequestLike for reqwest::Request {
    fn method(&self) -> &str {
        reqwest::Request::method(self).as_str()
    }
    fn host(&self) -> Option<String> {
        self.headers()
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .or_else(|| host_from_url(self.url()))
    }
    fn request_uri(&self) -> String {
        request_uri_from_url(self.url())
    }
    fn header(&self, name: &str) -> Option<HeaderValue> {
        header_from_map(self.headers(), name)
    }
}

impl ClientRequestLike for reqwest::Request {
    fn set_header(&mut self, header: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(header, value);
    }
}

impl RequestLike for reqwest::blocking::Request {
    fn method(&self) -> &str {
        reqwest::blocking::Request::method(self).as_str()
    }
    fn host(&self) -> Option<String> {
        self.headers()
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .or_else(|| host_from_url(self.url()))
    }
    fn request_uri(&self) -> String {
        request_uri_from_url(self.url())
    }
    fn header(&self, name: &str) -> Option<HeaderValue> {
        header_from_map(self.headers(), name)
    }
}

impl ClientRequestLike for reqwest::blocking::Request {
    fn set_header(&mut self, header: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(header, value);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{offset::TimeZone, Utc};
    use http::header::{AUTHORIZATION, CONTENT_TYPE};

    use super::*;

    fn signed_at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2014, 7, 8, 9, 10, 11)
            .single()
            .expect("valid date")
    }

    #[test]
    fn it_works() {
        let config =
            SigningConfig::new("test_key", "abcdefgh").with_headers(vec!["Content-Type"]);

        let client = reqwest::Client::new();

        let mut req = client
            .post("http://test.com/foo/bar?x=1")
            .header(CONTENT_TYPE, "application/json")
            .body(&br#"{ "x": 1, "y": 2}"#[..])
            .build()
            .unwrap();
        req.sign_at(&config, signed_at()).unwrap();

        let expected = sign(
            "POST\ntest.com\n/foo/bar?x=1\n2014-07-08T09:10:11Z\napplication/json\n",
            "abcdefgh",
        );
        assert_eq!(
            req.headers().get(AUTHORIZATION).unwrap(),
            format!(
                "APIKey=test_key,Signature={},Timestamp=2014-07-08T09:10:11Z",
                expected
            )
            .as_str()
        );
    }

    #[test]
    fn it_works_blocking() {
        let config = SigningConfig::new("test_key", "abcdefgh");

        let mut req = reqwest::blocking::Request::new(
            reqwest::Method::GET,
            "http://localhost:8080/config".parse().unwrap(),
        );
        req.sign_at(&config, signed_at()).unwrap();

        let expected = sign(
            "GET\nlocalhost:8080\n/config\n2014-07-08T09:10:11Z\n",
            "abcdefgh",
        );
        assert_eq!(
            req.headers().get(AUTHORIZATION).unwrap(),
            format!(
                "APIKey=test_key,Signature={},Timestamp=2014-07-08T09:10:11Z",
                expected
            )
            .as_str()
        );
    }

    #[test]
    fn signed_request_verifies() {
        let config =
            SigningConfig::new("test_key", "abcdefgh").with_headers(vec!["Content-Type"]);
        let req = reqwest::Client::new()
            .get("http://localhost:8080/config?verbose")
            .header(CONTENT_TYPE, "text/plain")
            .build()
            .unwrap()
            .signed(&config)
            .unwrap();

        let verifying =
            VerifyingConfig::new(SimpleSecretResolver::new(vec![("test_key", "abcdefgh")]))
                .with_required_headers(vec!["Content-Type"]);
        req.verify(&verifying).unwrap();
    }

    #[test]
    #[ignore]
    fn it_can_talk_to_reference_integration() {
        let config = SigningConfig::new("dummykey", "dummysecret");

        let client = reqwest::blocking::Client::new();

        let req = client
            .get("http://localhost:8080/config")
            .build()
            .unwrap()
            .signed(&config)
            .unwrap();

        let result = client.execute(req).unwrap();
        println!("{:?}", result.text().unwrap());
    }
}
