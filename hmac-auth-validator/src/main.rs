use std::convert::TryFrom;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use hmac_auth::mock_request::MockRequest;
use hmac_auth::{
    CanonicalizeExt, Credential, RequestLike, SecretResolver, SigningConfig, SigningExt,
    VerifyingConfig, VerifyingExt, VerifyingOptions,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
enum Mode {
    /// Print the string to sign for the request
    Canonicalize,
    /// Sign the request and print it
    Sign,
    /// Verify the request's signature
    Verify,
}

#[derive(Debug, StructOpt)]
#[structopt(about = "Signs and verifies HMAC authenticated HTTP requests read from stdin.")]
struct Opt {
    #[structopt(subcommand)]
    mode: Mode,

    /// Headers covered by the signature, separated by spaces or commas
    #[structopt(short = "d", long, global = true)]
    headers: Option<String>,

    /// The API key to sign with. When verifying, the only API key accepted.
    #[structopt(short = "k", long, global = true)]
    api_key: Option<String>,

    /// The shared secret
    #[structopt(short, long, global = true)]
    secret: Option<String>,

    /// RFC 3339 timestamp. Defaults to the current time when signing, and to the
    /// request's own timestamp when canonicalizing.
    #[structopt(short, long, global = true)]
    timestamp: Option<String>,

    /// Maximum age of a signature in seconds. 0 disables expiration.
    #[structopt(short, long, global = true)]
    expiry: Option<u64>,
}

impl Opt {
    fn parse_headers(&self) -> Vec<String> {
        self.headers
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_ascii_whitespace())
            .filter(|s| !s.is_empty())
            .map(Into::into)
            .collect()
    }
    fn signed_at(&self) -> anyhow::Result<DateTime<Utc>> {
        match &self.timestamp {
            Some(timestamp) => Ok(DateTime::parse_from_rfc3339(timestamp)
                .with_context(|| format!("{:?}", timestamp))?
                .with_timezone(&Utc)),
            None => Ok(Utc::now()),
        }
    }
    fn canonical_timestamp(&self, req: &MockRequest) -> anyhow::Result<String> {
        if let Some(timestamp) = &self.timestamp {
            return Ok(timestamp.clone());
        }
        let auth = req
            .header("Authorization")
            .ok_or_else(|| anyhow!("No --timestamp given and the request is not signed"))?;
        let credential: Credential = auth.to_str()?.parse()?;
        Ok(credential.timestamp_raw().into())
    }
    fn signing_config(&self) -> anyhow::Result<SigningConfig> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("--api-key is required for signing"))?;
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| anyhow!("--secret is required for signing"))?;
        Ok(SigningConfig::new(api_key, secret).with_headers(self.parse_headers()))
    }
    fn verification_config(&self) -> anyhow::Result<VerifyingConfig> {
        let secret_resolver = self.secret.clone().map(|secret| {
            let api_key = self.api_key.clone();
            Arc::new(move |key: &str| {
                if api_key.as_deref().map_or(true, |k| k == key) {
                    Some(secret.clone())
                } else {
                    None
                }
            }) as Arc<dyn SecretResolver>
        });

        let config = VerifyingConfig::try_from(VerifyingOptions {
            required_headers: self.parse_headers(),
            secret_resolver,
            expiry: self.expiry.map(Duration::from_secs),
        })?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opt = Opt::from_args();

    let mut req = MockRequest::from_reader(&mut io::stdin().lock())?;

    log::info!("{:?}", req);

    match opt.mode {
        Mode::Canonicalize => {
            let timestamp = opt.canonical_timestamp(&req)?;
            let res = req.canonicalize(&timestamp, opt.parse_headers())?;
            io::stdout().lock().write_all(res.as_bytes())?;
        }
        Mode::Sign => {
            req.sign_at(&opt.signing_config()?, opt.signed_at()?)?;
            req.write(&mut io::stdout().lock())?;
        }
        Mode::Verify => {
            let credential = req.verify(&opt.verification_config()?)?;
            log::info!("Signature valid for API key {:?}", credential.api_key());
        }
    }

    Ok(())
}
