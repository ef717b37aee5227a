pub mod calendly;

use async_trait::async_trait;
use chrono::NaiveDateTime;

/// An external self-service booking page. The local planner stays authoritative: a time
/// reported here still has to be committed against the schedule.
#[async_trait]
pub trait BookingLinkProvider: Send + Sync {
    /// A single-use booking URL for an appointment of the given length.
    async fn create_link(&self, duration_minutes: u32) -> anyhow::Result<String>;

    /// Start time of the newest active booking made by this invitee, if any.
    async fn latest_booking(&self, invitee_email: &str) -> anyhow::Result<Option<NaiveDateTime>>;
}

/// Whether a reply claims the patient already booked through the link.
pub fn claims_booked(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    ["booked", "done", "scheduled it", "i scheduled"]
        .iter()
        .any(|phrase| crate::services::extraction::contains_phrase(&lower, phrase))
}
