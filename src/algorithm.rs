use std::fmt::{self, Debug};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Implementations of this trait compute and check the signature carried in the
/// `Signature` parameter of the `Authorization` header.
pub trait HttpSignature: Debug + Send + Sync + 'static {
    /// Short name of the algorithm, eg. `hmac-sha256`.
    fn name(&self) -> &str;
    /// Returns the encoded signature, ready for inclusion in the `Authorization`
    /// header. The encoding is standard base64 with padding.
    fn http_sign(&self, bytes_to_sign: &[u8]) -> String;
    /// Returns true if the signature is valid for the provided content. The
    /// comparison is performed in constant time.
    fn http_verify(&self, bytes_to_verify: &[u8], signature: &str) -> bool {
        let expected_signature = self.http_sign(bytes_to_verify);
        expected_signature
            .as_bytes()
            .ct_eq(signature.as_bytes())
            .into()
    }
}

/// HMAC using SHA-256, keyed by a shared secret.
#[derive(Clone)]
pub struct HmacSha256(Hmac<Sha256>);

impl HmacSha256 {
    /// Create a new instance of the signature scheme using the provided
    /// shared secret. Any secret length is accepted, including zero.
    pub fn new(secret: &[u8]) -> Self {
        Self(Hmac::new_from_slice(secret).expect("HMAC can take key of any size"))
    }
}

impl Debug for HmacSha256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("HmacSha256 { .. }")
    }
}

impl HttpSignature for HmacSha256 {
    fn name(&self) -> &str {
        "hmac-sha256"
    }
    fn http_sign(&self, bytes_to_sign: &[u8]) -> String {
        let mut mac = self.0.clone();
        mac.update(bytes_to_sign);
        base64::encode(mac.finalize().into_bytes())
    }
}

/// Signs `message` with `secret`, returning the base64 encoded HMAC-SHA256 digest.
pub fn sign(message: &str, secret: &str) -> String {
    HmacSha256::new(secret.as_bytes()).http_sign(message.as_bytes())
}
