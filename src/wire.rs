use serde::{Deserialize, Serialize};

use crate::{account::Links, AccountData};

#[derive(Debug, Serialize)]
pub struct DataRequest<'a> {
    pub data: &'a AccountData,
}

#[derive(Debug, Deserialize)]
pub struct DataResponse {
    pub data: AccountData,
}

#[derive(Debug, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub data: Vec<AccountData>,
    #[serde(default)]
    pub links: Links,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
}
