use async_trait::async_trait;

use crate::error::Result;

pub const DEFAULT_BASE_URL: &str = "https://api.bunny.net";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one wire request. The retry loop lives above this seam so that
/// tests can script responses without touching the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<RawResponse>;
}

#[derive(Debug, Clone)]
enum HeaderKey {
    AccessKey,
    ContentType,
    Accept,
}

impl HeaderKey {
    fn as_str(&self) -> &str {
        match self {
            HeaderKey::AccessKey => "AccessKey",
            HeaderKey::ContentType => "Content-Type",
            HeaderKey::Accept => "Accept",
        }
    }
}

#[derive(Debug, Clone)]
struct Header {
    key: HeaderKey,
    value: String,
}

pub struct HttpTransport {
    cli: reqwest::Client,
    base_url: String,
    dft_headers: Vec<Header>,
}

impl HttpTransport {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Self {
        let dft_headers = vec![
            Header {
                key: HeaderKey::AccessKey,
                value: api_key.to_string(),
            },
            Header {
                key: HeaderKey::ContentType,
                value: "application/json".to_string(),
            },
            Header {
                key: HeaderKey::Accept,
                value: "application/json".to_string(),
            },
        ];

        Self {
            cli: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            dft_headers,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = match request.method {
            Method::Get => self.cli.get(&url),
            Method::Post => self.cli.post(&url),
            Method::Put => self.cli.put(&url),
            Method::Delete => self.cli.delete(&url),
        };

        for header in &self.dft_headers {
            builder = builder.header(header.key.as_str(), header.value.as_str());
        }

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        Ok(RawResponse {
            status: response.status().into(),
            body: response.text().await?,
        })
    }
}
