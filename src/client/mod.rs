mod rest;
mod transport;

pub use rest::{ApiClient, RetryPolicy, Sleeper};
pub use transport::{DEFAULT_BASE_URL, HttpTransport, Method, RawResponse, Request, Transport};

#[cfg(test)]
pub(crate) mod testing;
