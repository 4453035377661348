//! Public marketplace metadata.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigResponse {
    pub name: String,
    pub docs_url: String,
    pub support_email: Option<String>,
    /// Prefix every buyer key starts with
    pub api_key_prefix: String,
    pub catalog_page_size: u32,
}
