//! Storage SharedKey request signing.

use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::AzureError;

type HmacSha256 = Hmac<Sha256>;

/// Decoded account key. Never printed.
#[derive(Clone)]
pub struct SharedKey {
    account: String,
    key: Vec<u8>,
}

impl SharedKey {
    pub fn new(account: &str, encoded_key: &str) -> Result<Self, AzureError> {
        let key = general_purpose::STANDARD
            .decode(encoded_key)
            .map_err(|_| AzureError::InvalidKey {
                account: account.to_string(),
            })?;

        Ok(Self {
            account: account.to_string(),
            key,
        })
    }

    /// `/{account}{path}`; `path` is the already-encoded URL path.
    pub fn canonical_resource(&self, path: &str) -> String {
        format!("/{}{}", self.account, path)
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self, string_to_sign: &str) -> Result<String, AzureError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| AzureError::InvalidKey {
            account: self.account.clone(),
        })?;
        mac.update(string_to_sign.as_bytes());
        let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{}", self.account, signature))
    }
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKey")
            .field("account", &self.account)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Builds the blob service string-to-sign. `ms_headers` are the `x-ms-*`
/// headers sent with the request; order does not matter.
pub fn string_to_sign(
    method: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, &str)],
    canonical_resource: &str,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    // Content-Encoding, Content-Language, Content-MD5, Date and the
    // conditional/range headers are never sent, so their lines stay empty.
    format!(
        "{method}\n\n\n{length}\n\n{content_type}\n\n\n\n\n\n\n{canonical_headers}{canonical_resource}"
    )
}
