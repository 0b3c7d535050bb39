use serde::{Deserialize, Serialize};
use snip_shortener::BatchRequest;

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchItemRequest {
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default)]
    pub original_url: String,
}

impl From<BatchItemRequest> for BatchRequest {
    fn from(value: BatchItemRequest) -> Self {
        Self {
            correlation_id: value.correlation_id,
            original_url: value.original_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchItemResponse {
    pub correlation_id: String,
    pub short_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserUrlResponse {
    pub short_url: String,
    pub original_url: String,
}
