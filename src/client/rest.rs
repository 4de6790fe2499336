use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;

use crate::error::{Error, Result};

use super::transport::{HttpTransport, Method, RawResponse, Request, Transport};

/// Bounded exponential backoff for throttled calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` (0-based) throttled calls.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt)
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Authenticated remote client. Every call goes through `perform`, which
/// retries on throttling and maps every other non-2xx status straight to an
/// error kind.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ApiClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_transport(Arc::new(HttpTransport::new(api_key)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    pub fn set_sleeper(&mut self, sleeper: Arc<dyn Sleeper>) {
        self.sleeper = sleeper;
    }

    pub async fn get(&self, path: &str, query: Option<&[(&str, &str)]>) -> Result<Value> {
        self.perform(Method::Get, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Value> {
        self.perform(Method::Post, path, None, body).await
    }

    pub async fn put(&self, path: &str, body: Option<Value>) -> Result<Value> {
        self.perform(Method::Put, path, None, body).await
    }

    pub async fn delete(&self, path: &str, query: Option<&[(&str, &str)]>) -> Result<Value> {
        self.perform(Method::Delete, path, query, None).await
    }

    pub async fn perform(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<Value>,
    ) -> Result<Value> {
        let request = Request {
            method,
            path: path.to_string(),
            query: query
                .map(|q| {
                    q.iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
            body,
        };

        for attempt in 0..=self.retry.max_retries {
            let response = self.transport.send(&request).await?;
            if response.status != 429 {
                return handle_response(response);
            }
            if attempt == self.retry.max_retries {
                break;
            }
            let delay = self.retry.delay(attempt);
            warn!(
                "{} {}: throttled, retrying in {:?}",
                method.as_str(),
                request.path,
                delay
            );
            self.sleeper.sleep(delay).await;
        }

        Err(Error::Throttled(format!(
            "{} {}: retries exhausted",
            method.as_str(),
            request.path
        )))
    }
}

fn handle_response(response: RawResponse) -> Result<Value> {
    let RawResponse { status, body } = response;
    match status {
        // A success with an empty or unparsable body is an empty result.
        200 | 201 => Ok(serde_json::from_str(&body).unwrap_or(Value::Null)),
        204 => Ok(Value::Null),
        400 => Err(Error::Validation(body)),
        401 => Err(Error::Auth("check the access key".to_string())),
        403 => Err(Error::Forbidden(body)),
        404 => Err(Error::NotFound(body)),
        429 => Err(Error::Throttled("rate limit exceeded".to_string())),
        _ => Err(Error::Remote {
            status,
            message: body,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{RecordingSleeper, ScriptedTransport};
    use serde_json::json;

    fn client_with(transport: Arc<ScriptedTransport>) -> ApiClient {
        ApiClient::with_transport(transport)
    }

    #[tokio::test]
    async fn test_200_returns_parsed_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/dnszone", 200, r#"{"Items": []}"#);

        let body = client_with(transport).get("/dnszone", None).await.unwrap();
        assert_eq!(body, json!({"Items": []}));
    }

    #[tokio::test]
    async fn test_200_empty_body_yields_null() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/dnszone", 200, "");

        let body = client_with(transport).get("/dnszone", None).await.unwrap();
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_204_yields_null() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Delete, "/dnszone/1", 204, "");

        let body = client_with(transport)
            .delete("/dnszone/1", None)
            .await
            .unwrap();
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let cases = [
            (400, "Validation"),
            (401, "Auth"),
            (403, "Forbidden"),
            (404, "NotFound"),
            (500, "Remote"),
        ];

        for (status, expected) in cases {
            let transport = Arc::new(ScriptedTransport::new());
            transport.on(Method::Get, "/pullzone", status, "boom");

            let err = client_with(transport).get("/pullzone", None).await.unwrap_err();
            let matched = match (&err, expected) {
                (Error::Validation(_), "Validation") => true,
                (Error::Auth(_), "Auth") => true,
                (Error::Forbidden(_), "Forbidden") => true,
                (Error::NotFound(_), "NotFound") => true,
                (Error::Remote { status: 500, .. }, "Remote") => true,
                _ => false,
            };
            assert!(matched, "status {} mapped to {:?}", status, err);
        }
    }

    #[tokio::test]
    async fn test_throttling_retries_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/dnszone", 429, "");
        transport.on(Method::Get, "/dnszone", 429, "");
        transport.on(Method::Get, "/dnszone", 200, r#"{"Items": [1]}"#);

        let sleeper = Arc::new(RecordingSleeper::default());
        let mut client = client_with(transport.clone());
        client.set_sleeper(sleeper.clone());

        let body = client.get("/dnszone", None).await.unwrap();
        assert_eq!(body, json!({"Items": [1]}));
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(
            sleeper.slept(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_throttling_exhausts_retries() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Get, "/dnszone", 429, "");

        let sleeper = Arc::new(RecordingSleeper::default());
        let mut client = client_with(transport.clone());
        client.set_sleeper(sleeper.clone());

        let err = client.get("/dnszone", None).await.unwrap_err();
        assert!(matches!(err, Error::Throttled(_)));
        // Initial call plus three retries.
        assert_eq!(transport.requests().len(), 4);
        assert_eq!(
            sleeper.slept(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ]
        );
    }

    #[tokio::test]
    async fn test_query_and_body_pass_through() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Post, "/dnszone", 201, "{}");
        transport.on(Method::Get, "/pullzone/loadFreeCertificate", 200, "");

        let client = client_with(transport.clone());
        client
            .post("/dnszone", Some(json!({"Domain": "example.com"})))
            .await
            .unwrap();
        client
            .get(
                "/pullzone/loadFreeCertificate",
                Some(&[("hostname", "cdn.example.com")]),
            )
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].body, Some(json!({"Domain": "example.com"})));
        assert_eq!(
            requests[1].query,
            vec![("hostname".to_string(), "cdn.example.com".to_string())]
        );
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
    }
}
