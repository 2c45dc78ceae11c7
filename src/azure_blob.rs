//! Azure Blob Storage REST client.
//!
//! Implements [`ObjectStore`] for one blob container using the Blob service
//! REST API with Shared Key authentication. Supports connection strings,
//! account name/key pairs, custom endpoints (Azurite, sovereign clouds),
//! and `List Blobs` pagination via `NextMarker`.
//!
//! Signing uses only pure-Rust dependencies (`hmac`, `sha2`, `base64`).
//!
//! # Authentication
//!
//! Every request carries `x-ms-date`, `x-ms-version`, and an
//! `Authorization: SharedKey {account}:{signature}` header, where the
//! signature is `Base64(HMAC-SHA256(Base64Decode(key), StringToSign))` over
//!
//! ```text
//! VERB \n
//! Content-Encoding \n Content-Language \n Content-Length \n Content-MD5 \n
//! Content-Type \n Date \n If-Modified-Since \n If-Match \n If-None-Match \n
//! If-Unmodified-Since \n Range \n
//! CanonicalizedHeaders CanonicalizedResource
//! ```
//!
//! # Status handling
//!
//! | Operation | Success | Treated as absent |
//! |-----------|---------|-------------------|
//! | Put Blob | 201 | |
//! | Get Blob | 200 | 404 |
//! | Get Blob Properties | 200 | 404 |
//! | Delete Blob | 202 | 404 |
//! | Create Container | 201, 409 | |
//!
//! Any other status becomes [`Error::Upstream`] with the service's
//! `<Message>` when present.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rag_adapters_core::{Error, ObjectStore, Result};
use reqwest::{Method, StatusCode, Url};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "azure-blob";

/// REST API version sent as `x-ms-version`.
pub const API_VERSION: &str = "2021-08-06";

/// Default `maxresults` for `List Blobs` (the service maximum).
pub const DEFAULT_PAGE_SIZE: u32 = 5000;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Account and key of the local storage emulator.
const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

// ═══════════════════════════════════════════════════════════════════════
// Storage account credentials
// ═══════════════════════════════════════════════════════════════════════

/// Storage account name, decoded Shared Key, and blob service endpoint.
#[derive(Clone)]
pub struct StorageAccount {
    name: String,
    key: Vec<u8>,
    blob_endpoint: String,
}

impl StorageAccount {
    /// Build from an account name and base64 account key.
    ///
    /// Without `endpoint` the public cloud endpoint
    /// `https://{name}.blob.core.windows.net` is used.
    pub fn new(name: &str, key: &str, endpoint: Option<&str>) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::configuration("storage account name must not be empty"));
        }
        let key = decode_account_key(key)?;
        let blob_endpoint = match endpoint.map(str::trim).filter(|e| !e.is_empty()) {
            Some(e) => e.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.{}", name, DEFAULT_ENDPOINT_SUFFIX),
        };
        Ok(Self {
            name: name.to_string(),
            key,
            blob_endpoint,
        })
    }

    /// Parse a `Key=Value;Key=Value` storage connection string.
    ///
    /// Recognized keys: `AccountName`, `AccountKey`, `DefaultEndpointsProtocol`,
    /// `EndpointSuffix`, `BlobEndpoint`, `UseDevelopmentStorage`. Other keys
    /// are ignored.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = "https".to_string();
        let mut suffix = DEFAULT_ENDPOINT_SUFFIX.to_string();
        let mut blob_endpoint = None;
        let mut development = false;

        for part in connection_string.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = part.split_once('=').ok_or_else(|| {
                Error::configuration(format!(
                    "malformed connection string segment: {}",
                    key_only(part)
                ))
            })?;
            let value = value.trim().to_string();
            match key.trim() {
                "AccountName" => account_name = Some(value),
                "AccountKey" => account_key = Some(value),
                "DefaultEndpointsProtocol" => protocol = value,
                "EndpointSuffix" => suffix = value,
                "BlobEndpoint" => blob_endpoint = Some(value),
                "UseDevelopmentStorage" => development = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if development {
            return Self::new(
                DEV_ACCOUNT_NAME,
                DEV_ACCOUNT_KEY,
                Some(blob_endpoint.as_deref().unwrap_or(DEV_BLOB_ENDPOINT)),
            );
        }

        let name = account_name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::configuration("connection string has no AccountName"))?;
        let key = account_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::credentials_missing("connection string has no AccountKey"))?;
        let endpoint = blob_endpoint
            .unwrap_or_else(|| format!("{}://{}.blob.{}", protocol, name, suffix));

        Self::new(&name, &key, Some(&endpoint))
    }

    /// Replace the blob service endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        let endpoint = endpoint.trim();
        if !endpoint.is_empty() {
            self.blob_endpoint = endpoint.trim_end_matches('/').to_string();
        }
        self
    }

    /// Whether the endpoint is the public cloud default for this account.
    pub fn has_default_endpoint(&self) -> bool {
        self.blob_endpoint == format!("https://{}.blob.{}", self.name, DEFAULT_ENDPOINT_SUFFIX)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blob_endpoint(&self) -> &str {
        &self.blob_endpoint
    }
}

impl fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("key", &"<redacted>")
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

/// Never echo a connection-string segment value; it may be the key.
fn key_only(segment: &str) -> &str {
    segment.split('=').next().unwrap_or(segment)
}

fn decode_account_key(key: &str) -> Result<Vec<u8>> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::credentials_missing("storage account key is empty"));
    }
    BASE64
        .decode(key)
        .map_err(|_| Error::configuration("storage account key is not valid base64"))
}

// ═══════════════════════════════════════════════════════════════════════
// Container client
// ═══════════════════════════════════════════════════════════════════════

/// Client for one blob container.
pub struct AzureBlobClient {
    http: reqwest::Client,
    account: StorageAccount,
    container: String,
    page_size: u32,
}

impl AzureBlobClient {
    pub fn new(account: StorageAccount, container: &str) -> Result<Self> {
        validate_container_name(container)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            account,
            container: container.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the `List Blobs` page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    pub fn account(&self) -> &StorageAccount {
        &self.account
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Create the container if it does not exist yet.
    pub async fn ensure_container(&self) -> Result<()> {
        let url = self.container_url(&[("restype", "container")])?;
        let resp = self.send(Method::PUT, url, None, &[]).await?;
        match resp.status() {
            StatusCode::CREATED => {
                tracing::info!(container = %self.container, "created blob container");
                Ok(())
            }
            StatusCode::CONFLICT => Ok(()),
            _ => Err(upstream_error(resp).await),
        }
    }

    /// Container URL with percent-encoded query parameters.
    fn container_url(&self, params: &[(&str, &str)]) -> Result<Url> {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        parse_url(&format!(
            "{}/{}?{}",
            self.account.blob_endpoint, self.container, query
        ))
    }

    fn blob_url(&self, key: &str) -> Result<Url> {
        parse_url(&format!(
            "{}/{}/{}",
            self.account.blob_endpoint,
            self.container,
            encode_blob_path(key)
        ))
    }

    /// Sign and send one request.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<(Vec<u8>, &str)>,
        ms_headers: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let mut headers: Vec<(&str, &str)> =
            vec![("x-ms-date", date.as_str()), ("x-ms-version", API_VERSION)];
        headers.extend_from_slice(ms_headers);

        let (content_length, content_type) = match &body {
            Some((bytes, content_type)) => (bytes.len(), *content_type),
            None => (0, ""),
        };

        let sts = string_to_sign(
            method.as_str(),
            content_length,
            content_type,
            &headers,
            &canonical_resource(&self.account.name, &url),
        );
        let authorization = format!(
            "SharedKey {}:{}",
            self.account.name,
            sign(&self.account.key, &sts)
        );

        tracing::debug!(method = %method, path = url.path(), "azure blob request");

        let mut req = self
            .http
            .request(method, url.clone())
            .header("Authorization", authorization);
        for (name, value) in &headers {
            req = req.header(*name, *value);
        }
        if let Some((bytes, content_type)) = body {
            req = req.header("Content-Type", content_type).body(bytes);
        }

        req.send().await.map_err(|e| {
            Error::upstream(SERVICE, None, format!("{} {}: {}", self.container, url.path(), e))
        })
    }
}

#[async_trait]
impl ObjectStore for AzureBlobClient {
    fn location(&self) -> String {
        format!("{}/{}", self.account.blob_endpoint, self.container)
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.blob_url(key)?;
        let resp = self
            .send(
                Method::PUT,
                url,
                Some((body, content_type)),
                &[("x-ms-blob-type", "BlockBlob")],
            )
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(upstream_error(resp).await)
        }
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let url = self.blob_url(key)?;
        let resp = self.send(Method::GET, url, None, &[]).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let bytes = resp.bytes().await.map_err(|e| {
                    Error::upstream(SERVICE, None, format!("failed to read {}: {}", key, e))
                })?;
                Ok(Some(bytes.to_vec()))
            }
            _ => Err(upstream_error(resp).await),
        }
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        let url = self.blob_url(key)?;
        let resp = self.send(Method::HEAD, url, None, &[]).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(upstream_error(resp).await),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page_size = self.page_size.to_string();
            let mut params = vec![
                ("restype", "container"),
                ("comp", "list"),
                ("maxresults", page_size.as_str()),
            ];
            if !prefix.is_empty() {
                params.push(("prefix", prefix));
            }
            if let Some(ref m) = marker {
                params.push(("marker", m.as_str()));
            }
            let url = self.container_url(&params)?;

            let resp = self.send(Method::GET, url, None, &[]).await?;
            if !resp.status().is_success() {
                return Err(upstream_error(resp).await);
            }
            let xml = resp.text().await.map_err(|e| {
                Error::upstream(SERVICE, None, format!("failed to read listing: {}", e))
            })?;

            let (batch, next_marker) = parse_list_blobs(&xml)?;
            keys.extend(batch);

            match next_marker {
                Some(m) => marker = Some(m),
                None => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let url = self.blob_url(key)?;
        let resp = self.send(Method::DELETE, url, None, &[]).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(()),
            s if s.is_success() => Ok(()),
            _ => Err(upstream_error(resp).await),
        }
    }
}

/// Container names: 3-63 characters of lowercase letters, digits and
/// single hyphens, starting and ending with a letter or digit.
fn validate_container_name(name: &str) -> Result<()> {
    let valid = (3..=63).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--");
    if valid {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "invalid blob container name: {:?}",
            name
        )))
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::configuration(format!("invalid blob URL {}: {}", raw, e)))
}

async fn upstream_error(resp: reqwest::Response) -> Error {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = extract_error_message(&body)
        .unwrap_or_else(|| body.chars().take(500).collect::<String>());
    Error::upstream(SERVICE, Some(status), message)
}

// ═══════════════════════════════════════════════════════════════════════
// Shared Key helpers
// ═══════════════════════════════════════════════════════════════════════

/// Build the Shared Key string-to-sign.
///
/// `ms_headers` holds every `x-ms-*` header sent; they are lowercased and
/// sorted here. A zero content length is signed as the empty string.
fn string_to_sign(
    verb: &str,
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
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        verb, length, content_type, canonical_headers, canonical_resource
    )
}

/// `/{account}{path}` followed by one `\n{name}:{value}` line per query
/// parameter, names lowercased and sorted, values decoded.
fn canonical_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{}{}", account, url.path());

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
        .collect();
    params.sort();
    for (name, value) in params {
        resource.push('\n');
        resource.push_str(&name);
        resource.push(':');
        resource.push_str(&value);
    }
    resource
}

/// Compute Base64(HMAC-SHA256(key, string_to_sign)).
fn sign(key: &[u8], string_to_sign: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Percent-encode a blob name per segment, keeping `/` separators.
fn encode_blob_path(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// URI-encode a string per RFC 3986.
///
/// Encodes all characters except unreserved characters:
/// `A-Z a-z 0-9 - _ . ~`
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

// ============ XML Parsing ============

/// Parse a `List Blobs` response into blob names and the next marker.
///
/// An empty or missing `<NextMarker>` means the listing is complete.
fn parse_list_blobs(xml: &str) -> Result<(Vec<String>, Option<String>)> {
    #[derive(PartialEq)]
    enum Field {
        None,
        BlobName,
        NextMarker,
    }

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut names = Vec::new();
    let mut next_marker = None;
    let mut in_blob = false;
    let mut field = Field::None;

    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"Blob" => in_blob = true,
                b"Name" if in_blob => field = Field::BlobName,
                b"NextMarker" => field = Field::NextMarker,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) => {
                let text = te
                    .unescape()
                    .map_err(|e| malformed_listing(e.to_string()))?
                    .into_owned();
                match field {
                    Field::BlobName => names.push(text),
                    Field::NextMarker if !text.is_empty() => next_marker = Some(text),
                    _ => {}
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"Blob" {
                    in_blob = false;
                }
                field = Field::None;
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(malformed_listing(e.to_string())),
            _ => {}
        }
    }

    Ok((names, next_marker))
}

fn malformed_listing(message: String) -> Error {
    Error::upstream(SERVICE, None, format!("malformed List Blobs response: {}", message))
}

/// Extract `<Message>` from a storage error body.
fn extract_error_message(xml: &str) -> Option<String> {
    let start = xml.find("<Message>")? + "<Message>".len();
    let end = xml[start..].find("</Message>")?;
    let message = xml[start..start + end].trim();
    let first_line = message.lines().next().unwrap_or(message).trim();
    (!first_line.is_empty()).then(|| first_line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "c2VjcmV0LWtleQ=="; // "secret-key"

    #[test]
    fn test_connection_string_defaults_to_public_endpoint() {
        let account = StorageAccount::from_connection_string(&format!(
            "DefaultEndpointsProtocol=https;AccountName=acme;AccountKey={};EndpointSuffix=core.windows.net",
            TEST_KEY
        ))
        .unwrap();
        assert_eq!(account.name(), "acme");
        assert_eq!(account.blob_endpoint(), "https://acme.blob.core.windows.net");
        assert_eq!(account.key, b"secret-key");
    }

    #[test]
    fn test_connection_string_blob_endpoint_and_suffix() {
        let account = StorageAccount::from_connection_string(&format!(
            "AccountName=acme;AccountKey={};BlobEndpoint=http://localhost:10000/acme/",
            TEST_KEY
        ))
        .unwrap();
        assert_eq!(account.blob_endpoint(), "http://localhost:10000/acme");

        let account = StorageAccount::from_connection_string(&format!(
            "AccountName=acme;AccountKey={};EndpointSuffix=core.chinacloudapi.cn",
            TEST_KEY
        ))
        .unwrap();
        assert_eq!(account.blob_endpoint(), "https://acme.blob.core.chinacloudapi.cn");
    }

    #[test]
    fn test_connection_string_development_storage() {
        let account =
            StorageAccount::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(account.name(), "devstoreaccount1");
        assert_eq!(account.blob_endpoint(), DEV_BLOB_ENDPOINT);
    }

    #[test]
    fn test_connection_string_errors() {
        let err = StorageAccount::from_connection_string(&format!("AccountKey={}", TEST_KEY))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = StorageAccount::from_connection_string("AccountName=acme").unwrap_err();
        assert!(matches!(err, Error::CredentialsMissing(_)));

        let err = StorageAccount::from_connection_string("AccountName=acme;AccountKey=%%%")
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = StorageAccount::from_connection_string("AccountName=acme;garbage").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let account = StorageAccount::new("acme", TEST_KEY, None).unwrap();
        let debug = format!("{:?}", account);
        assert!(debug.contains("acme"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret"));
        assert!(!debug.contains(TEST_KEY));
    }

    #[test]
    fn test_string_to_sign_layout() {
        let sts = string_to_sign(
            "PUT",
            11,
            "application/json",
            &[
                ("x-ms-version", API_VERSION),
                ("x-ms-blob-type", "BlockBlob"),
                ("x-ms-date", "Fri, 16 Oct 2026 12:00:00 GMT"),
            ],
            "/acme/kb/kb1/doc1/elements.json",
        );
        assert_eq!(
            sts,
            "PUT\n\n\n11\n\napplication/json\n\n\n\n\n\n\n\
             x-ms-blob-type:BlockBlob\n\
             x-ms-date:Fri, 16 Oct 2026 12:00:00 GMT\n\
             x-ms-version:2021-08-06\n\
             /acme/kb/kb1/doc1/elements.json"
        );
    }

    #[test]
    fn test_string_to_sign_zero_length_is_empty() {
        let sts = string_to_sign("GET", 0, "", &[], "/acme/kb");
        assert_eq!(sts, "GET\n\n\n\n\n\n\n\n\n\n\n\n/acme/kb");
    }

    #[test]
    fn test_canonical_resource_sorts_decoded_query() {
        let url = Url::parse(
            "https://acme.blob.core.windows.net/kb?restype=container&comp=list&prefix=kb1%2Fdoc%201%2F&maxresults=10",
        )
        .unwrap();
        assert_eq!(
            canonical_resource("acme", &url),
            "/acme/kb\ncomp:list\nmaxresults:10\nprefix:kb1/doc 1/\nrestype:container"
        );
    }

    #[test]
    fn test_canonical_resource_path_style_endpoint() {
        let url = Url::parse("http://127.0.0.1:10000/devstoreaccount1/kb/a/b.json").unwrap();
        assert_eq!(
            canonical_resource("devstoreaccount1", &url),
            "/devstoreaccount1/devstoreaccount1/kb/a/b.json"
        );
    }

    #[test]
    fn test_sign_known_vector() {
        // HMAC-SHA256 of "GET\n" under key "secret-key", base64 encoded.
        assert_eq!(
            sign(b"secret-key", "GET\n"),
            "rVZ8CFV8Qs1VESy/+Ihd+qVfvZCfzge7mmVJqM2hWMM="
        );
    }

    #[test]
    fn test_encode_blob_path_keeps_separators() {
        assert_eq!(encode_blob_path("kb1/doc 1/page_1.json"), "kb1/doc%201/page_1.json");
        assert_eq!(encode_blob_path("kb/doc/a+b.txt"), "kb/doc/a%2Bb.txt");
    }

    #[test]
    fn test_container_name_rules() {
        assert!(validate_container_name("kb-artifacts").is_ok());
        assert!(validate_container_name("abc").is_ok());
        for bad in ["ab", "Upper", "-lead", "trail-", "dou--ble", "under_score"] {
            assert!(validate_container_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_parse_list_blobs_with_marker() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acme.blob.core.windows.net/" ContainerName="kb">
  <Prefix>kb1/</Prefix>
  <MaxResults>2</MaxResults>
  <Blobs>
    <Blob><Name>kb1/doc1/elements.json</Name><Properties><Content-Length>10</Content-Length></Properties></Blob>
    <Blob><Name>kb1/doc1/R&amp;D.txt</Name><Properties /></Blob>
  </Blobs>
  <NextMarker>2!80!MDAwMDE4</NextMarker>
</EnumerationResults>"#;
        let (names, marker) = parse_list_blobs(xml).unwrap();
        assert_eq!(names, vec!["kb1/doc1/elements.json", "kb1/doc1/R&D.txt"]);
        assert_eq!(marker.as_deref(), Some("2!80!MDAwMDE4"));
    }

    #[test]
    fn test_parse_list_blobs_last_page() {
        let xml = r#"<EnumerationResults><Blobs><Blob><Name>a</Name></Blob></Blobs><NextMarker /></EnumerationResults>"#;
        let (names, marker) = parse_list_blobs(xml).unwrap();
        assert_eq!(names, vec!["a"]);
        assert!(marker.is_none());

        let xml = r#"<EnumerationResults><Blobs /><NextMarker></NextMarker></EnumerationResults>"#;
        let (names, marker) = parse_list_blobs(xml).unwrap();
        assert!(names.is_empty());
        assert!(marker.is_none());
    }

    #[test]
    fn test_extract_error_message() {
        let body = "<?xml version=\"1.0\"?><Error><Code>AuthenticationFailed</Code><Message>Server failed to authenticate the request.\nRequestId:abc</Message></Error>";
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Server failed to authenticate the request.")
        );
        assert_eq!(extract_error_message("plain text"), None);
    }
}
