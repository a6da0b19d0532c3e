use http::header::HeaderValue;
use rouille::{Request, Response, ResponseBody};

use super::*;

impl RequestLike for Request {
    fn method(&self) -> &str {
        Request::method(self)
    }
    fn host(&self) -> Option<String> {
        Request::header(self, "Host").map(Into::into)
    }
    fn request_uri(&self) -> String {
        self.raw_url().into()
    }
    fn header(&self, name: &str) -> Option<HeaderValue> {
        Request::header(self, name).and_then(|v| HeaderValue::from_str(v).ok())
    }
}

/// Middleware which only lets requests through to `handler` if they carry a
/// valid signature. Any other request is answered with `401 Unauthorized` and the
/// reason as a plain text body.
///
/// ```rust,no_run
/// use hmac_auth::{hmac_auth, SimpleSecretResolver, VerifyingConfig};
///
/// let config = VerifyingConfig::new(SimpleSecretResolver::new(vec![("My Key", "secret")]));
///
/// rouille::start_server("localhost:8080", move |request| {
///     hmac_auth(request, &config, |_request| rouille::Response::text("hello"))
/// });
/// ```
pub fn hmac_auth<F>(request: &Request, config: &VerifyingConfig, handler: F) -> Response
where
    F: FnOnce(&Request) -> Response,
{
    match request.verify(config) {
        Ok(_) => handler(request),
        Err(e) => Response {
            status_code: e.status_code().as_u16(),
            headers: Vec::new(),
            data: ResponseBody::from_string(format!("{}\n", e)),
            upgrade: None,
        },
    }
}
