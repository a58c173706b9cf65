//! Legacy S3 query-string request signing.
//!
//! Implements the pre-SigV4 authorization scheme: an HMAC-SHA1 over a
//! newline-joined string-to-sign, base64-encoded and appended to the URL
//! as `AWSAccessKeyId`/`Expires`/`Signature` query parameters.
//!
//! The string-to-sign format:
//! ```text
//! VERB\n
//! file_id\n
//! Content-Type\n
//! Expires (epoch seconds)\n
//! x-amz-* headers as name:value lines, in insertion order\n
//! canonical resource URL
//! ```
//!
//! This must stay byte-exact with the provider's verification: the
//! custom headers are deliberately folded in insertion order, not sorted
//! or de-duplicated, and query parameters keep the order the caller set.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sha1::Sha1;
use std::time::SystemTime;
use tracing::debug;

use crate::errors::UploadError;
use crate::models::{ObjectOptions, Signature};

type HmacSha1 = Hmac<Sha1>;

/// Everything the signer needs for one request. All fields are borrowed;
/// signing never mutates the options it is handed.
pub struct SigningContext<'a> {
    pub access_id: &'a str,
    pub secret_key: &'a str,
    /// Region endpoint host, e.g. `s3.amazonaws.com`.
    pub endpoint_host: &'a str,
    pub bucket_name: &'a str,
    pub object_key: &'a str,
    /// Stands in for the content-hash line of the string-to-sign; this is
    /// an idempotency token, not a checksum of the payload.
    pub file_id: Option<&'a str>,
    pub options: &'a ObjectOptions,
}

/// Build the canonical resource URL: scheme, host, `/bucket/key?`, then
/// every query parameter in insertion order as `key&` (empty value) or
/// `key=value&`.
fn canonical_url(ctx: &SigningContext<'_>) -> String {
    let mut url = format!(
        "{}://{}/{}/{}?",
        ctx.options.protocol.as_str(),
        ctx.endpoint_host,
        ctx.bucket_name,
        ctx.object_key
    );
    for (key, value) in ctx.options.parameters.iter() {
        if value.is_empty() {
            url.push_str(key);
            url.push('&');
        } else {
            url.push_str(key);
            url.push('=');
            url.push_str(value);
            url.push('&');
        }
    }
    url
}

/// Sign one request. Pure computation; the only failure mode is an
/// options bag missing its verb or expiry, which the adapter always sets
/// before calling in.
pub fn sign_request(ctx: &SigningContext<'_>) -> Result<Signature, UploadError> {
    let verb = ctx
        .options
        .verb
        .as_deref()
        .ok_or_else(|| UploadError::configuration("signing requires a verb"))?
        .to_uppercase();
    let expires = ctx
        .options
        .expires
        .ok_or_else(|| UploadError::configuration("signing requires an expiry"))?
        .timestamp();

    // The date is rendered as an HTTP-date but only the epoch expiry
    // enters the string-to-sign; the provider checks `Expires` alone.
    let http_date = ctx
        .options
        .date
        .ok_or_else(|| UploadError::configuration("signing requires a date"))
        .map(|d| httpdate::fmt_http_date(SystemTime::from(d)))?;

    let url = canonical_url(ctx);
    debug!(verb = %verb, date = %http_date, expires, url = %url, "signing request");

    let mut string_to_sign = format!(
        "{}\n{}\n{}\n{}\n",
        verb,
        ctx.file_id.unwrap_or(""),
        ctx.options.headers.get("Content-Type").unwrap_or(""),
        expires
    );
    for (name, value) in ctx.options.headers.iter() {
        if name.to_ascii_lowercase().contains("x-amz-") {
            string_to_sign.push_str(name);
            string_to_sign.push(':');
            string_to_sign.push_str(value);
            string_to_sign.push('\n');
        }
    }
    string_to_sign.push_str(&url);

    let mut mac = HmacSha1::new_from_slice(ctx.secret_key.as_bytes())
        .map_err(|e| UploadError::configuration(format!("HMAC key error: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    let digest = mac.finalize().into_bytes();

    // Historical encoders wrapped base64 at 60 columns; strip any embedded
    // newlines before URL-escaping so the output matches verifiers that do
    // the same.
    let encoded = BASE64_STANDARD.encode(digest).replace('\n', "");
    let escaped = utf8_percent_encode(&encoded, NON_ALPHANUMERIC).to_string();

    let signed_url = format!(
        "{url}AWSAccessKeyId={}&Expires={expires}&Signature={escaped}",
        ctx.access_id
    );

    Ok(Signature {
        verb,
        url: signed_url,
        headers: ctx.options.headers.clone(),
    })
}
