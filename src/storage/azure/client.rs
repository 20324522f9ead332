use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Method, Response, StatusCode, Url};

use super::AzureError;
use super::auth::{SharedKey, string_to_sign};
use super::types::{
    ARM_API_VERSION, AccountKey, AccountKeysResponse, AccountListResponse, ArmErrorResponse,
    BLOB_API_VERSION,
};
use crate::storage::{AccountPage, ResolvedAccount};

pub const ARM_ENDPOINT: &str = "https://management.azure.com";

#[derive(Debug, Clone)]
pub struct AzureClientOptions {
    pub arm_endpoint: String,
    /// Path-style blob endpoint (`{endpoint}/{account}/{container}/{blob}`),
    /// e.g. Azurite. `None` uses `https://{account}.blob.core.windows.net`.
    pub blob_endpoint: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for AzureClientOptions {
    fn default() -> Self {
        Self {
            arm_endpoint: ARM_ENDPOINT.to_string(),
            blob_endpoint: None,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

#[derive(Clone)]
pub struct AzureStorageClient {
    client: reqwest::Client,
    token: String,
    subscription_id: String,
    arm_base: String,
    blob_endpoint: Option<String>,
    keys: Arc<Mutex<HashMap<String, SharedKey>>>,
}

impl AzureStorageClient {
    pub fn new(subscription_id: String, token: String) -> Result<Self, AzureError> {
        Self::with_options(subscription_id, token, AzureClientOptions::default())
    }

    pub fn with_options(
        subscription_id: String,
        token: String,
        options: AzureClientOptions,
    ) -> Result<Self, AzureError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(AzureError::Network)?;

        Ok(Self {
            client,
            token,
            subscription_id,
            arm_base: options.arm_endpoint.trim_end_matches('/').to_string(),
            blob_endpoint: options
                .blob_endpoint
                .map(|e| e.trim_end_matches('/').to_string()),
            keys: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    // Checked per call: an empty token fails only once ARM is reached.
    fn bearer_token(&self) -> Result<&str, AzureError> {
        if self.token.trim().is_empty() {
            return Err(AzureError::Auth {
                message: "No access token provided. Set AZURE_ACCESS_TOKEN or use --access-token"
                    .to_string(),
            });
        }
        Ok(&self.token)
    }

    // NOTE: `continuation` is the previous page's nextLink, used verbatim
    pub async fn list_accounts_page(
        &self,
        continuation: Option<String>,
    ) -> Result<AccountPage, AzureError> {
        let url = continuation.unwrap_or_else(|| {
            format!(
                "{}/subscriptions/{}/providers/Microsoft.Storage/storageAccounts?api-version={}",
                self.arm_base,
                urlencoding::encode(&self.subscription_id),
                ARM_API_VERSION
            )
        });

        let token = self.bearer_token()?;
        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let response = check_arm_response(response).await?;

        let body: AccountListResponse = response.json().await.map_err(|e| AzureError::Parse {
            message: format!("storage account list: {}", e),
        })?;

        tracing::debug!(
            count = body.value.len(),
            has_more = body.next_link.is_some(),
            "storage account page received"
        );

        Ok(AccountPage {
            accounts: body.value,
            next: body.next_link.filter(|link| !link.is_empty()),
        })
    }

    pub async fn list_account_keys(
        &self,
        account: &ResolvedAccount,
    ) -> Result<Vec<AccountKey>, AzureError> {
        let token = self.bearer_token()?;
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}/listKeys?api-version={}",
            self.arm_base,
            urlencoding::encode(&self.subscription_id),
            urlencoding::encode(&account.resource_group),
            urlencoding::encode(&account.name),
            ARM_API_VERSION
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await?;
        let response = check_arm_response(response).await?;

        let body: AccountKeysResponse = response.json().await.map_err(|e| AzureError::Parse {
            message: format!("storage account keys: {}", e),
        })?;

        Ok(body.keys)
    }

    async fn shared_key(&self, account: &ResolvedAccount) -> Result<SharedKey, AzureError> {
        if let Some(key) = self.cached_key(&account.name) {
            return Ok(key);
        }

        let keys = self.list_account_keys(account).await?;
        let first = keys.first().ok_or_else(|| AzureError::NoAccountKeys {
            account: account.name.clone(),
        })?;
        tracing::debug!(
            account = %account.name,
            key_name = %first.key_name,
            "using storage account key"
        );
        let key = SharedKey::new(&account.name, &first.value)?;

        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(account.name.clone(), key.clone());

        Ok(key)
    }

    fn cached_key(&self, account: &str) -> Option<SharedKey> {
        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(account)
            .cloned()
    }

    pub fn blob_url(&self, account: &str, container: &str, key: &str) -> String {
        let container = urlencoding::encode(container);
        let key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        match &self.blob_endpoint {
            Some(base) => format!("{}/{}/{}/{}", base, account, container, key),
            None => format!("https://{}.blob.core.windows.net/{}/{}", account, container, key),
        }
    }

    async fn blob_request(
        &self,
        method: Method,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
        body: Option<Vec<u8>>,
        extra_headers: &[(&str, &str)],
    ) -> Result<Response, AzureError> {
        let shared_key = self.shared_key(account).await?;
        let url_string = self.blob_url(&account.name, container, key);
        let url = Url::parse(&url_string).map_err(|e| AzureError::Parse {
            message: format!("blob url: {}", e),
        })?;

        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let content_length = body.as_ref().map(Vec::len).unwrap_or(0);
        let content_type = if body.is_some() {
            "application/octet-stream"
        } else {
            ""
        };

        let mut ms_headers: Vec<(&str, &str)> =
            vec![("x-ms-date", date.as_str()), ("x-ms-version", BLOB_API_VERSION)];
        ms_headers.extend_from_slice(extra_headers);

        let to_sign = string_to_sign(
            method.as_str(),
            content_length,
            content_type,
            &ms_headers,
            &shared_key.canonical_resource(url.path()),
        );
        let authorization = shared_key.authorization(&to_sign)?;

        let mut request = self
            .client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, authorization);
        for (name, value) in &ms_headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body);
        }

        Ok(request.send().await?)
    }

    pub async fn blob_exists(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
    ) -> Result<bool, AzureError> {
        let response = self
            .blob_request(Method::HEAD, account, container, key, None, &[])
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(blob_error(response).await),
        }
    }

    pub async fn upload_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), AzureError> {
        let response = self
            .blob_request(
                Method::PUT,
                account,
                container,
                key,
                Some(data),
                &[("x-ms-blob-type", "BlockBlob")],
            )
            .await?;

        if !response.status().is_success() {
            return Err(blob_error(response).await);
        }
        Ok(())
    }

    pub async fn download_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
    ) -> Result<Vec<u8>, AzureError> {
        let response = self
            .blob_request(Method::GET, account, container, key, None, &[])
            .await?;

        if !response.status().is_success() {
            return Err(blob_error(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn delete_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
        include_snapshots: bool,
    ) -> Result<(), AzureError> {
        let headers: &[(&str, &str)] = if include_snapshots {
            &[("x-ms-delete-snapshots", "include")]
        } else {
            &[]
        };

        let response = self
            .blob_request(Method::DELETE, account, container, key, None, headers)
            .await?;

        if !response.status().is_success() {
            return Err(blob_error(response).await);
        }
        Ok(())
    }
}

async fn check_arm_response(response: Response) -> Result<Response, AzureError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let (code, message) = match response.json::<ArmErrorResponse>().await {
        Ok(body) => (body.error.code, body.error.message),
        Err(_) => (String::new(), "Unknown error".to_string()),
    };

    if status == StatusCode::UNAUTHORIZED {
        return Err(AzureError::Auth { message });
    }

    Err(AzureError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

// NOTE: Blob errors carry the code in `x-ms-error-code`; the XML body is ignored
async fn blob_error(response: Response) -> AzureError {
    let status = response.status();
    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    AzureError::Api {
        status: status.as_u16(),
        code,
        message: status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    }
}

impl std::fmt::Debug for AzureStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureStorageClient")
            .field("subscription_id", &self.subscription_id)
            .field("arm_base", &self.arm_base)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
