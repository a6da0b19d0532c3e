use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The parameters which may appear in the `Authorization` header.
#[derive(Debug, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// `APIKey`: identifies the shared secret used to sign the request.
    ApiKey,
    /// `Signature`: base64 encoded HMAC over the string to sign.
    Signature,
    /// `Timestamp`: RFC 3339 time at which the request was signed.
    Timestamp,
}

impl Parameter {
    /// Returns the parameter name as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Parameter::ApiKey => "APIKey",
            Parameter::Signature => "Signature",
            Parameter::Timestamp => "Timestamp",
        }
    }
}

impl FromStr for Parameter {
    type Err = ();
    fn from_str(s: &str) -> Result<Parameter, Self::Err> {
        match s {
            "APIKey" => Ok(Parameter::ApiKey),
            "Signature" => Ok(Parameter::Signature),
            "Timestamp" => Ok(Parameter::Timestamp),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ways in which an `Authorization` header value can fail to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The header was absent or empty.
    #[error("Authorization Header Not Supplied")]
    MissingHeader,
    /// A parameter name other than `APIKey`, `Signature` or `Timestamp` was
    /// present, or a fragment had no `=`.
    #[error("Invalid parameter in header string")]
    InvalidParameter,
    /// A recognised parameter appeared more than once.
    #[error("Repeated parameter: \"{0}\" in header string")]
    RepeatedParameter(Parameter),
    /// The `Timestamp` value is not an RFC 3339 timestamp.
    #[error("Invalid timestamp. Requires RFC3339 format.")]
    InvalidTimestamp,
    /// One of the three parameters was absent or empty.
    #[error("Missing parameter in header string")]
    MissingParameter,
}

/// The credential carried by a single request, parsed from its `Authorization`
/// header:
///
/// ```text
/// APIKey=<api key>,Signature=<base64 signature>,Timestamp=<RFC 3339 timestamp>
/// ```
///
/// A `Credential` always has a non-empty API key and signature, and a valid
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    api_key: String,
    signature: String,
    timestamp_raw: String,
    timestamp: DateTime<Utc>,
}

impl Credential {
    /// Returns the API key used to look up the signing secret.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
    /// Returns the signature exactly as supplied.
    pub fn signature(&self) -> &str {
        &self.signature
    }
    /// Returns the timestamp text exactly as supplied. This, rather than a
    /// reformatted timestamp, is what goes into the string to sign.
    pub fn timestamp_raw(&self) -> &str {
        &self.timestamp_raw
    }
    /// Returns the parsed timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl FromStr for Credential {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Credential, Self::Err> {
        parse(s)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ParseError::InvalidTimestamp)
}

/// Parse the value of an `Authorization` header.
///
/// Parameters are separated by `,` and may appear in any order. Spaces around
/// each parameter are ignored, and the value extends from the first `=` to the
/// next `,`. There is no quoting, so values cannot contain a comma.
pub fn parse(header_value: &str) -> Result<Credential, ParseError> {
    if header_value.is_empty() {
        return Err(ParseError::MissingHeader);
    }

    let mut api_key = None;
    let mut signature = None;
    let mut timestamp = None;

    for part in header_value.split(',') {
        let mut kv = part.trim_matches(' ').splitn(2, '=');
        let parameter: Parameter = kv
            .next()
            .and_then(|name| name.parse().ok())
            .ok_or(ParseError::InvalidParameter)?;
        let value = kv.next().ok_or(ParseError::InvalidParameter)?;

        let repeated = match parameter {
            Parameter::ApiKey => api_key.replace(value).is_some(),
            Parameter::Signature => signature.replace(value).is_some(),
            Parameter::Timestamp => {
                if timestamp.is_some() {
                    true
                } else {
                    timestamp = Some((value, parse_timestamp(value)?));
                    false
                }
            }
        };
        if repeated {
            return Err(ParseError::RepeatedParameter(parameter));
        }
    }

    match (api_key, signature, timestamp) {
        (Some(api_key), Some(signature), Some((timestamp_raw, timestamp)))
            if !api_key.is_empty() && !signature.is_empty() =>
        {
            Ok(Credential {
                api_key: api_key.into(),
                signature: signature.into(),
                timestamp_raw: timestamp_raw.into(),
                timestamp,
            })
        }
        _ => Err(ParseError::MissingParameter),
    }
}
