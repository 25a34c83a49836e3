//! Remote event store.
//!
//! URL building and list parsing are always available; the HTTP client
//! needs the `api` feature.

use crate::dom::Element;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spk_utils::dates;

#[cfg(feature = "api")]
use crate::error::EventError;
#[cfg(feature = "api")]
use crate::cursor::EventCursor;
#[cfg(feature = "api")]
use log::{info, warn};
#[cfg(feature = "api")]
use reqwest::{Client, RequestBuilder, StatusCode};
#[cfg(feature = "api")]
use std::time::Duration;

/// Prefix of the resource names this tool uploads under.
pub const UPLOAD_PREFIX: &str = "obspyck_";

pub fn list_url(base: &str, start: &DateTime<Utc>, end: &DateTime<Utc>) -> String {
    format!(
        "{}/seismology/event/getList?min_datetime={}&max_datetime={}",
        base.trim_end_matches('/'),
        dates::format_iso(start),
        dates::format_iso(end)
    )
}

pub fn resource_url(base: &str, name: &str) -> String {
    format!("{}/xml/seismology/event/{}", base.trim_end_matches('/'), name)
}

pub fn upload_url(base: &str, event_id: &str) -> String {
    resource_url(base, &format!("{}{}", UPLOAD_PREFIX, event_id))
}

/// Names of every `resource_name` element of an event list, in document order.
pub fn parse_resource_names(xml: &str) -> Result<Vec<String>> {
    fn collect(element: &Element, names: &mut Vec<String>) {
        if element.name == "resource_name" {
            let name = element.text.trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
        for child in &element.children {
            collect(child, names);
        }
    }
    let root = Element::parse(xml)?;
    let mut names = Vec::new();
    collect(&root, &mut names);
    Ok(names)
}

/// Connection settings of the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub base_url: String,
    pub user: String,
    pub password: String,
    pub timeout_seconds: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            base_url: "http://teide:8080".to_string(),
            user: "admin".to_string(),
            password: "admin".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// HTTP client of the event store.
#[cfg(feature = "api")]
pub struct EventStoreClient {
    client: Client,
    settings: StoreSettings,
}

#[cfg(feature = "api")]
impl EventStoreClient {
    pub fn new(settings: StoreSettings) -> Result<EventStoreClient> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .user_agent("spk")
            .build()?;
        Ok(EventStoreClient { client, settings })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.settings.user, Some(&self.settings.password))
    }

    /// GET with retry and exponential backoff on failed requests and bad
    /// status codes.
    async fn get_text(&self, url: &str) -> Result<String> {
        let max_tries = 3;
        let mut sleep_millis: u64 = 1000;
        let mut last_error = None;

        for attempt in 1..=max_tries {
            match self.authorized(self.client.get(url)).send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    return Ok(response.text().await?);
                }
                Ok(response) => {
                    warn!(
                        "Attempt {}/{}: Bad response status for {}: {}",
                        attempt,
                        max_tries,
                        url,
                        response.status()
                    );
                    last_error = Some(EventError::HttpStatus {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }
                Err(e) => {
                    warn!("Attempt {}/{}: Request failed for {}: {}", attempt, max_tries, url, e);
                    last_error = Some(EventError::HttpRequest(e));
                }
            }
            if attempt < max_tries {
                info!("Sleeping for {} milliseconds before retry", sleep_millis);
                tokio::time::sleep(Duration::from_millis(sleep_millis)).await;
                sleep_millis *= 2;
            }
        }
        Err(last_error.unwrap_or(EventError::HttpStatus {
            url: url.to_string(),
            status: 0,
        }))
    }

    /// Resource names of the events whose origin lies in `[start, end]`.
    pub async fn list_events(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let body = self
            .get_text(&list_url(&self.settings.base_url, start, end))
            .await?;
        parse_resource_names(&body)
    }

    pub async fn fetch_event(&self, name: &str) -> Result<String> {
        self.get_text(&resource_url(&self.settings.base_url, name))
            .await
    }

    /// List the window and fetch the event the cursor advances to.
    /// Returns the resource name with the document.
    pub async fn fetch_next(
        &self,
        cursor: &mut EventCursor,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<(String, String)> {
        let names = self.list_events(start, end).await?;
        let Some(index) = cursor.next(names.len()) else {
            return Err(EventError::NoEvents {
                start: dates::format_iso(start),
                end: dates::format_iso(end),
            });
        };
        let name = names[index].clone();
        info!(
            "Fetching event {} of {} ({})",
            index + 1,
            names.len(),
            name
        );
        let xml = self.fetch_event(&name).await?;
        Ok((name, xml))
    }

    /// PUT a document under `obspyck_<event_id>`; the store answers 201.
    pub async fn upload_event(&self, event_id: &str, xml: String) -> Result<String> {
        let url = upload_url(&self.settings.base_url, event_id);
        let response = self
            .authorized(self.client.put(&url))
            .header("Content-Type", "text/xml; charset=\"UTF-8\"")
            .body(xml)
            .send()
            .await?;
        if response.status() != StatusCode::CREATED {
            return Err(EventError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }
        info!("Upload to event store successful ({})", url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ResultSet totalResultsAvailable="2" totalResultsReturned="2" firstResultPosition="0">
  <Item>
    <document_id>12</document_id>
    <resource_name>obspyck_1261911160</resource_name>
  </Item>
  <Item>
    <document_id>13</document_id>
    <resource_name>baynet_2009-12-27</resource_name>
  </Item>
</ResultSet>"#;

    #[test]
    fn test_parse_resource_names() {
        assert_eq!(
            parse_resource_names(LIST).unwrap(),
            vec!["obspyck_1261911160", "baynet_2009-12-27"]
        );
        assert!(parse_resource_names("<ResultSet/>").unwrap().is_empty());
        assert!(parse_resource_names("<ResultSet>").is_err());
    }

    #[test]
    fn test_urls() {
        let start = dates::parse_iso("2009-12-27T10:50:00").unwrap();
        let end = dates::parse_iso("2009-12-27T11:00:00").unwrap();
        assert_eq!(
            list_url("http://teide:8080/", &start, &end),
            "http://teide:8080/seismology/event/getList?min_datetime=2009-12-27T10:50:00.000000&max_datetime=2009-12-27T11:00:00.000000"
        );
        assert_eq!(
            resource_url("http://teide:8080", "baynet_2009-12-27"),
            "http://teide:8080/xml/seismology/event/baynet_2009-12-27"
        );
        assert_eq!(
            upload_url("http://teide:8080", "1261911160"),
            "http://teide:8080/xml/seismology/event/obspyck_1261911160"
        );
    }
}
