use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use serde_json::Value;

use crate::ratelimit::RateLimiter;

pub struct RequestClient {
    client: Client,
    rate_limiter: RateLimiter,
}

impl RequestClient {
    pub fn new(rate_limiter: RateLimiter) -> anyhow::Result<Self> {
        let client = ClientBuilder::new().build()?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// GET a JSON document. The timeout bounds the whole call, connect and
    /// body read included; a non-2xx status is an error.
    pub async fn fetch_json(&self, url: &str, timeout: Duration) -> anyhow::Result<Value> {
        // Wait (non-blocking) until we're allowed to make a request according
        // to our self-imposed rate-limiting policy.
        self.rate_limiter.wait_until_ready().await;

        let response = self.client.get(url).timeout(timeout).send().await?;
        let response = response.error_for_status()?;
        let body = response.json::<Value>().await?;
        Ok(body)
    }
}
