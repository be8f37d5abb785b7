//! Remote queue access.
//!
//! The shared queue is one JSON-encoded string of whitespace-separated
//! addresses. The wire contract is read-everything / replace-everything:
//! `GET` returns the whole blob (or `null`), `PUT` overwrites it. A consume
//! cycle removes exactly the first address and writes the remainder back in
//! the original relative order.
//!
//! The read-remove-write cycle is NOT atomic. Concurrent consumers can lose
//! or duplicate entries; that race is an accepted property of the shared
//! endpoint, not something this client papers over.

use url::Url;

use crate::error::Result;

/// The entire queue state as an ordered address list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueBlob {
    addresses: Vec<String>,
}

impl QueueBlob {
    /// Parses the wire text: whitespace-separated addresses, empty text is an
    /// empty queue.
    pub fn parse(raw: &str) -> Self {
        Self {
            addresses: raw.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn from_addresses(addresses: Vec<String>) -> Self {
        Self { addresses }
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Removes and returns the first address, keeping the rest in order.
    pub fn take_first(&mut self) -> Option<String> {
        if self.addresses.is_empty() {
            None
        } else {
            Some(self.addresses.remove(0))
        }
    }

    pub fn push(&mut self, address: impl Into<String>) {
        self.addresses.push(address.into());
    }

    /// Serializes back to the wire text form.
    pub fn to_wire(&self) -> String {
        self.addresses.join(" ")
    }
}

/// Narrow fetch/replace client for the shared queue endpoint.
#[derive(Debug, Clone)]
pub struct QueueClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl QueueClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: Url::parse(endpoint)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Reads the whole blob. A `null` body is an empty queue.
    pub async fn fetch(&self) -> Result<QueueBlob> {
        let raw: Option<String> = self
            .http
            .get(self.endpoint.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(QueueBlob::parse(raw.as_deref().unwrap_or_default()))
    }

    /// Replaces the whole blob.
    pub async fn replace(&self, blob: &QueueBlob) -> Result<()> {
        self.http
            .put(self.endpoint.clone())
            .json(&blob.to_wire())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parse_splits_on_any_whitespace() {
        let blob = QueueBlob::parse("https://a  https://b\nhttps://c\t");
        assert_eq!(blob.len(), 3);
        assert_eq!(blob.addresses()[1], "https://b");
    }

    #[test]
    fn take_first_preserves_remainder_order() {
        let mut blob = QueueBlob::parse("https://a https://b https://c");
        assert_eq!(blob.take_first().as_deref(), Some("https://a"));
        assert_eq!(blob.to_wire(), "https://b https://c");
    }

    #[test]
    fn empty_blob_yields_nothing() {
        let mut blob = QueueBlob::parse("   ");
        assert!(blob.is_empty());
        assert_eq!(blob.take_first(), None);
        assert_eq!(blob.to_wire(), "");
    }

    #[tokio::test]
    async fn fetch_parses_json_string_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/links.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json("https://a https://b"))
            .mount(&server)
            .await;

        let client = QueueClient::new(&format!("{}/links.json", server.uri())).unwrap();
        let blob = client.fetch().await.unwrap();
        assert_eq!(blob.addresses(), ["https://a", "https://b"]);
    }

    #[tokio::test]
    async fn fetch_treats_null_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::Value::Null))
            .mount(&server)
            .await;

        let client = QueueClient::new(&server.uri()).unwrap();
        assert!(client.fetch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_puts_json_encoded_wire_form() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/links.json"))
            .and(body_json("https://b"))
            .respond_with(ResponseTemplate::new(200).set_body_json("https://b"))
            .expect(1)
            .mount(&server)
            .await;

        let client = QueueClient::new(&format!("{}/links.json", server.uri())).unwrap();
        let mut blob = QueueBlob::parse("https://a https://b");
        blob.take_first();
        client.replace(&blob).await.unwrap();
    }

    #[tokio::test]
    async fn http_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = QueueClient::new(&server.uri()).unwrap();
        assert!(client.fetch().await.is_err());
    }
}
