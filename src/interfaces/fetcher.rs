use async_trait::async_trait;
use crate::config::route::Route;
use crate::error::Result;

/// Whatever the browser driver handed back for one route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawResponse {
    Bytes(Vec<u8>),
    Text(String),
}

impl RawResponse {
    pub fn into_text(self) -> std::result::Result<String, std::string::FromUtf8Error> {
        match self {
            RawResponse::Bytes(bytes) => String::from_utf8(bytes),
            RawResponse::Text(text) => Ok(text),
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, route: &Route) -> Result<RawResponse>;
    fn source_id(&self) -> &str;
}
