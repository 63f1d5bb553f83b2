//! Yandex Disk REST API client.
//!
//! API Base: https://cloud-api.yandex.net/v1/disk
//! Auth: `Authorization: OAuth {token}`
//! Transfers go through pre-signed links: the API hands out an `href` and the
//! bytes are sent to (or read from) that link with a separate client that
//! carries no credentials.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ByteStream, DiskApi, DiskError, DiskInfo, Resource, UploadOptions};

pub const DEFAULT_API_URL: &str = "https://cloud-api.yandex.net/v1/disk";

/// Items requested per page when listing a folder
const PAGE_SIZE: usize = 100;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CLIENT_USER_AGENT: &str = concat!("yandex-disk-backup/", env!("CARGO_PKG_VERSION"));

/// Identifier presented on archive uploads to avoid the default-client throttle.
const UPLOAD_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Pre-signed transfer link returned by the upload/download endpoints.
#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Deserialize)]
struct ResourceList {
    #[serde(default)]
    items: Vec<Resource>,
}

/// Folder resource with its embedded page of children.
#[derive(Debug, Deserialize)]
struct FolderPage {
    #[serde(rename = "_embedded")]
    embedded: Option<ResourceList>,
}

pub struct YandexDiskClient {
    api_url: String,
    /// Carries the OAuth header; used for metadata calls
    api: Client,
    /// Credential-free client for pre-signed transfer links
    transfer: Client,
}

impl YandexDiskClient {
    /// Build the API and transfer clients.
    ///
    /// Initialising the TLS backend blocks, so async callers should run this
    /// inside `spawn_blocking`.
    pub fn new(token: &str, api_url: &str) -> Result<Self, DiskError> {
        let mut auth = HeaderValue::from_str(&format!("OAuth {token}")).map_err(|e| {
            DiskError::Unauthorized(format!("Invalid characters in OAuth token: {e}"))
        })?;
        auth.set_sensitive(true);

        let mut api_headers = HeaderMap::new();
        api_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        api_headers.insert(AUTHORIZATION, auth);

        let api = Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .default_headers(api_headers)
            .build()
            .map_err(|e| DiskError::Connection(format!("Failed to build API client: {e}")))?;

        // No global timeout: archive transfers set their own per request
        let transfer = Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                DiskError::Connection(format!("Failed to build transfer client: {e}"))
            })?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api,
            transfer,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_url, endpoint)
    }

    async fn send(request: RequestBuilder) -> Result<Response, DiskError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(DiskError::from_response(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, DiskError> {
        let response = Self::send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| DiskError::Decode(e.to_string()))
    }

    async fn upload_link(&self, path: &str, overwrite: bool) -> Result<Link, DiskError> {
        let overwrite = if overwrite { "true" } else { "false" };
        let request = self
            .api
            .get(self.url("/resources/upload"))
            .query(&[("path", path), ("overwrite", overwrite)]);
        Self::send_json(request).await
    }

    async fn download_link(&self, path: &str) -> Result<Link, DiskError> {
        let request = self
            .api
            .get(self.url("/resources/download"))
            .query(&[("path", path)]);
        Self::send_json(request).await
    }
}

#[async_trait]
impl DiskApi for YandexDiskClient {
    async fn disk_info(&self) -> Result<DiskInfo, DiskError> {
        Self::send_json(self.api.get(self.url("/"))).await
    }

    async fn get_meta(&self, path: &str) -> Result<Resource, DiskError> {
        let request = self
            .api
            .get(self.url("/resources"))
            .query(&[("path", path), ("limit", "0")]);
        Self::send_json(request).await
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<Resource>, DiskError> {
        let mut items = Vec::new();
        let mut offset = 0usize;

        loop {
            let request = self.api.get(self.url("/resources")).query(&[
                ("path", path.to_string()),
                ("limit", PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ]);
            let page: FolderPage = Self::send_json(request).await?;
            let embedded = page
                .embedded
                .ok_or_else(|| DiskError::Decode(format!("{path} is not a folder")))?;

            let count = embedded.items.len();
            items.extend(embedded.items);
            debug!("Listed {} items from {} (offset {})", count, path, offset);

            if count < PAGE_SIZE {
                return Ok(items);
            }
            offset += count;
        }
    }

    async fn mkdir(&self, path: &str) -> Result<(), DiskError> {
        let request = self
            .api
            .put(self.url("/resources"))
            .query(&[("path", path)]);
        Self::send(request).await?;
        Ok(())
    }

    async fn remove(&self, path: &str, permanently: bool) -> Result<(), DiskError> {
        let permanently = if permanently { "true" } else { "false" };
        let request = self
            .api
            .delete(self.url("/resources"))
            .query(&[("path", path), ("permanently", permanently)]);
        // 204 when done, 202 when the API finishes the removal asynchronously
        Self::send(request).await?;
        Ok(())
    }

    async fn upload(
        &self,
        path: &str,
        body: ByteStream,
        options: UploadOptions,
    ) -> Result<(), DiskError> {
        let link = self.upload_link(path, options.overwrite).await?;

        let mut request = self
            .transfer
            .put(&link.href)
            .timeout(options.timeout)
            .body(reqwest::Body::wrap_stream(body));
        if options.spoof_user_agent {
            request = request.header(USER_AGENT, UPLOAD_USER_AGENT);
        }

        Self::send(request).await?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<ByteStream, DiskError> {
        let link = self.download_link(path).await?;
        let response = Self::send(self.transfer.get(&link.href)).await?;
        Ok(Box::pin(response.bytes_stream().map_err(DiskError::from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_strips_trailing_slash() {
        let client = YandexDiskClient::new("token", "https://example.test/v1/disk/").unwrap();
        assert_eq!(
            client.url("/resources"),
            "https://example.test/v1/disk/resources"
        );
    }

    #[test]
    fn test_rejects_token_with_control_characters() {
        let result = YandexDiskClient::new("bad\ntoken", DEFAULT_API_URL);
        assert!(matches!(result, Err(DiskError::Unauthorized(_))));
    }

    #[test]
    fn test_folder_page_parsing() {
        let json = r#"{
            "name": "Home Assistant Backups",
            "path": "disk:/Home Assistant Backups",
            "type": "dir",
            "_embedded": {
                "items": [
                    {"name": "a.tar", "path": "disk:/Home Assistant Backups/a.tar", "type": "file", "size": 10},
                    {"name": "old", "path": "disk:/Home Assistant Backups/old", "type": "dir"}
                ],
                "limit": 100,
                "offset": 0,
                "total": 2
            }
        }"#;

        let page: FolderPage = serde_json::from_str(json).unwrap();
        let items = page.embedded.unwrap().items;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_file());
        assert!(!items[1].is_file());
    }

    #[test]
    fn test_file_resource_has_no_embedded_page() {
        let json = r#"{"name": "a.tar", "path": "disk:/a.tar", "type": "file", "size": 1}"#;
        let page: FolderPage = serde_json::from_str(json).unwrap();
        assert!(page.embedded.is_none());
    }
}
