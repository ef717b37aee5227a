use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde_json::{json, Value};

use super::BookingLinkProvider;

const API_BASE: &str = "https://api.calendly.com";

pub struct CalendlyProvider {
    api_key: String,
    client: reqwest::Client,
}

impl CalendlyProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> anyhow::Result<Value> {
        let resp = self
            .client
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await
            .with_context(|| format!("failed to call Calendly {path}"))?;

        let status = resp.status();
        let data: Value = resp.json().await.context("failed to parse Calendly response")?;
        if !status.is_success() {
            anyhow::bail!("Calendly API error ({status}): {data}");
        }
        Ok(data)
    }

    async fn user_uri(&self) -> anyhow::Result<String> {
        let data = self.get("/users/me", &[]).await?;
        data["resource"]["uri"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("missing user uri in Calendly response"))
    }
}

/// The active event type whose length matches, else the first active one.
fn pick_event_type(collection: &[Value], duration_minutes: u32) -> Option<&str> {
    let active = || {
        collection
            .iter()
            .filter(|et| et["active"].as_bool().unwrap_or(true))
    };
    active()
        .find(|et| et["duration"].as_u64() == Some(u64::from(duration_minutes)))
        .or_else(|| active().next())
        .and_then(|et| et["uri"].as_str())
}

fn parse_start_time(raw: &str) -> anyhow::Result<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_local())
        .with_context(|| format!("invalid Calendly start_time {raw:?}"))
}

#[async_trait]
impl BookingLinkProvider for CalendlyProvider {
    async fn create_link(&self, duration_minutes: u32) -> anyhow::Result<String> {
        let user = self.user_uri().await?;
        let event_types = self.get("/event_types", &[("user", user.as_str())]).await?;
        let collection = event_types["collection"].as_array().cloned().unwrap_or_default();
        let event_type = pick_event_type(&collection, duration_minutes)
            .ok_or_else(|| anyhow::anyhow!("no active Calendly event types"))?;

        let resp = self
            .client
            .post(format!("{API_BASE}/scheduling_links"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "max_event_count": 1,
                "owner": event_type,
                "owner_type": "EventType",
            }))
            .send()
            .await
            .context("failed to create Calendly scheduling link")?
            .error_for_status()
            .context("Calendly API returned error")?;

        let data: Value = resp.json().await.context("failed to parse Calendly response")?;
        data["resource"]["booking_url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("missing booking_url in Calendly response"))
    }

    async fn latest_booking(&self, invitee_email: &str) -> anyhow::Result<Option<NaiveDateTime>> {
        let user = self.user_uri().await?;
        let events = self
            .get(
                "/scheduled_events",
                &[
                    ("user", user.as_str()),
                    ("invitee_email", invitee_email),
                    ("status", "active"),
                    ("sort", "start_time:desc"),
                    ("count", "1"),
                ],
            )
            .await?;

        match events["collection"][0]["start_time"].as_str() {
            Some(raw) => parse_start_time(raw).map(Some),
            None => Ok(None),
        }
    }
}
