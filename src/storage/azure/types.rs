use serde::Deserialize;

use crate::storage::StorageAccount;

pub const ARM_API_VERSION: &str = "2023-05-01";
pub const BLOB_API_VERSION: &str = "2021-08-06";

#[derive(Debug, Deserialize)]
pub struct AccountListResponse {
    #[serde(default)]
    pub value: Vec<StorageAccount>,
    #[serde(rename = "nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccountKeysResponse {
    #[serde(default)]
    pub keys: Vec<AccountKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKey {
    pub key_name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ArmErrorResponse {
    pub error: ArmErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ArmErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
