use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RETENTION: usize = 10;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub image: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// History of desired images of one component, keyed by `repository:tag`.
///
/// Unresolved lookups are recorded under the bare repository so that misses stay visible.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DesiredImageTimeline {
    entries: HashMap<String, TimelineEntry>,
}

impl DesiredImageTimeline {
    /// Records a resolved image, `reference` in `repository:tag` form.
    pub fn record_resolved(&mut self, reference: &str, now: DateTime<Utc>) {
        self.record(String::from(reference), true, now);
    }

    pub fn record_missing(&mut self, repository: &str, now: DateTime<Utc>) {
        self.record(String::from(repository), false, now);
    }

    fn record(&mut self, image: String, resolved: bool, now: DateTime<Utc>) {
        self.entries.entry(image.clone())
            .and_modify(|entry| entry.last_seen_at = now)
            .or_insert(TimelineEntry {
                image,
                resolved,
                created_at: now,
                last_seen_at: now,
            });
    }

    /// Keeps the `bound` most recently created entries. An entry whose image equals
    /// `active_image` survives even when it falls beyond the bound.
    ///
    /// Returns the removed images.
    pub fn prune(&mut self, bound: usize, active_image: Option<&str>) -> Vec<String> {
        if self.entries.len() <= bound {
            return Vec::new();
        }

        let mut by_age = self.entries.values()
            .map(|entry| (entry.created_at, entry.image.clone()))
            .collect::<Vec<_>>();
        by_age.sort_by(|(a_ts, a_img), (b_ts, b_img)| b_ts.cmp(a_ts).then_with(|| a_img.cmp(b_img)));

        let removed = by_age.into_iter()
            .skip(bound)
            .map(|(_, image)| image)
            .filter(|image| active_image.map(|active| active.ne(image)).unwrap_or(true))
            .collect::<Vec<_>>();

        for image in &removed {
            self.entries.remove(image);
        }
        removed
    }

    pub fn get(&self, image: &str) -> Option<&TimelineEntry> {
        self.entries.get(image)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered from the newest to the oldest.
    pub fn entries(&self) -> Vec<TimelineEntry> {
        let mut entries = self.entries.values().cloned().collect::<Vec<_>>();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }
}
