//! Program guide resolution
//!
//! Resolves the current and upcoming programs for a channel's primary
//! source and renders them as structured description text with a progress
//! bar. Guide failures degrade to an explicit unavailable state; they never
//! propagate to callers.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};

use crate::provider::GuideClient;
use crate::types::ProgramEntry;

/// Upcoming programs shown per channel; display economy, not correctness.
pub const UPCOMING_LIMIT: usize = 4;

const SEPARATOR: &str = "──────────────────────────";

/// Resolved guide window for one channel.
#[derive(Debug, Clone)]
pub struct GuideView {
    pub current: Option<ProgramEntry>,
    pub upcoming: Vec<ProgramEntry>,
    pub progress_percent: u8,
    pub available: bool,
}

impl GuideView {
    pub fn unavailable() -> Self {
        Self {
            current: None,
            upcoming: Vec::new(),
            progress_percent: 0,
            available: false,
        }
    }
}

/// Fetches and derives guide windows via the external guide collaborator.
pub struct GuideResolver {
    client: Arc<dyn GuideClient>,
    display_offset: FixedOffset,
}

impl GuideResolver {
    pub fn new(client: Arc<dyn GuideClient>, display_offset_minutes: i32) -> Self {
        let display_offset = FixedOffset::east_opt(display_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Self {
            client,
            display_offset,
        }
    }

    /// Resolve the guide for `source_id` at `now`. Never returns an error:
    /// fetch failures and empty payloads yield the unavailable state.
    pub async fn resolve(&self, source_id: &str, now: DateTime<Utc>) -> GuideView {
        let listings = match self.client.fetch_short_epg(source_id).await {
            Ok(listings) => listings,
            Err(err) => {
                tracing::debug!(source_id, error = %err, "guide fetch failed");
                return GuideView::unavailable();
            }
        };
        if listings.is_empty() {
            return GuideView::unavailable();
        }

        // When no window contains `now`, fall back to the first entry and
        // present it as the current program. Deliberately carried over from
        // the source system; see DESIGN.md before changing.
        let current = listings
            .iter()
            .find(|p| p.start <= now && now <= p.end)
            .unwrap_or(&listings[0])
            .clone();

        let upcoming = listings
            .iter()
            .filter(|p| p.start > now)
            .take(UPCOMING_LIMIT)
            .cloned()
            .collect();

        GuideView {
            progress_percent: progress_percent(&current, now),
            current: Some(current),
            upcoming,
            available: true,
        }
    }

    /// Render the multi-line guide description for a channel detail view.
    pub fn render_description(
        &self,
        channel_name: &str,
        category_label: &str,
        view: &GuideView,
        now: DateTime<Utc>,
    ) -> String {
        let local_now = now.with_timezone(&self.display_offset);
        let mut text = format!(
            "🕒 Local time: {}\n📺 Channel: {}\n📂 Group: {}\n{SEPARATOR}\n",
            local_now.format("%H:%M"),
            channel_name,
            category_label,
        );

        let Some(current) = &view.current else {
            text.push_str("📡 Guide currently unavailable.");
            return text;
        };

        let start = current.start.with_timezone(&self.display_offset);
        let end = current.end.with_timezone(&self.display_offset);
        text.push_str(&format!(
            "🔴 Now: {}\n⏰ {} - {}\n📊 {}\n",
            current.title,
            start.format("%H:%M"),
            end.format("%H:%M"),
            progress_bar(view.progress_percent),
        ));
        if !current.description.is_empty() {
            text.push_str(&format!("\n📝 {}\n", current.description));
        }

        if !view.upcoming.is_empty() {
            text.push_str(&format!("{SEPARATOR}\n📅 Coming up:\n"));
            for program in &view.upcoming {
                let at = program.start.with_timezone(&self.display_offset);
                text.push_str(&format!("• {} - {}\n", at.format("%H:%M"), program.title));
            }
        }
        text
    }
}

/// Elapsed share of the current program, clamped to 0..=100.
///
/// Out-of-window times clamp (before start: 0, after end: 100); a
/// zero-length window reports 0 rather than dividing by zero.
pub fn progress_percent(program: &ProgramEntry, now: DateTime<Utc>) -> u8 {
    if now < program.start {
        return 0;
    }
    if now > program.end {
        return 100;
    }
    let total = (program.end - program.start).num_seconds();
    if total <= 0 {
        return 0;
    }
    let elapsed = (now - program.start).num_seconds();
    ((elapsed as f64 / total as f64) * 100.0)
        .round()
        .clamp(0.0, 100.0) as u8
}

/// Ten-segment bar plus the numeric percentage.
fn progress_bar(percent: u8) -> String {
    let filled = ((percent as f64) / 10.0).round() as usize;
    let filled = filled.min(10);
    format!(
        "{}{} {percent}%",
        "🟢".repeat(filled),
        "⚪".repeat(10 - filled)
    )
}
