//! Usage counters.

use chrono::{Datelike, Utc};
use serde::Serialize;
use std::collections::HashMap;

const TOP_SITES: usize = 10;
const TOP_COUNTRIES: usize = 5;
const MAX_SITE_KEYS: usize = 10_000;
const MAX_COUNTRY_KEYS: usize = 300;
/// Country bucket for missing, malformed or overflowing codes.
pub const UNKNOWN_COUNTRY: &str = "XX";
const OTHER_SITES: &str = "(other)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteCount {
    pub url: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryCount {
    pub country: String,
    pub count: u64,
}

/// Relayed response bytes. `month` resets when the calendar month (UTC) changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bandwidth {
    pub total: u64,
    pub month: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub top_sites: Vec<SiteCount>,
    pub geo_stats: Vec<CountryCount>,
    pub bandwidth: Bandwidth,
}

/// Occurrence counter that remembers first-insertion order for tie breaking.
///
/// Once `max_keys` distinct keys are held, new keys are counted under
/// `overflow_key`.
#[derive(Debug)]
struct Tally {
    counts: HashMap<String, (u64, u64)>,
    next_seq: u64,
    max_keys: usize,
    overflow_key: &'static str,
}

impl Tally {
    fn bounded(max_keys: usize, overflow_key: &'static str) -> Self {
        Self {
            counts: HashMap::new(),
            next_seq: 0,
            max_keys,
            overflow_key,
        }
    }

    fn bump(&mut self, key: &str) {
        if let Some((count, _)) = self.counts.get_mut(key) {
            *count += 1;
            return;
        }
        let key = if self.counts.len() >= self.max_keys {
            self.overflow_key
        } else {
            key
        };
        if let Some((count, _)) = self.counts.get_mut(key) {
            *count += 1;
            return;
        }
        self.counts.insert(key.to_string(), (1, self.next_seq));
        self.next_seq += 1;
    }

    fn len(&self) -> usize {
        self.counts.len()
    }

    fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<_> = self
            .counts
            .iter()
            .map(|(k, (count, seq))| (k.clone(), *count, *seq))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        entries
            .into_iter()
            .take(n)
            .map(|(k, count, _)| (k, count))
            .collect()
    }
}

#[derive(Debug)]
pub struct Analytics {
    total_requests: u64,
    sites: Tally,
    countries: Tally,
    bandwidth: Bandwidth,
    month_key: (i32, u32),
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new()
    }
}

impl Analytics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_requests: 0,
            sites: Tally::bounded(MAX_SITE_KEYS, OTHER_SITES),
            countries: Tally::bounded(MAX_COUNTRY_KEYS, UNKNOWN_COUNTRY),
            bandwidth: Bandwidth::default(),
            month_key: current_month(),
        }
    }

    pub fn record_request(&mut self) {
        self.total_requests += 1;
    }

    pub fn record_visit(&mut self, site: &str) {
        if !site.is_empty() {
            self.sites.bump(site);
        }
    }

    /// Counts a two-character country code. Anything else is counted as
    /// [`UNKNOWN_COUNTRY`].
    pub fn record_country(&mut self, country: &str) {
        let country = country.trim();
        if country.is_empty() {
            return;
        }
        if country.len() == 2 && country.bytes().all(|b| b.is_ascii_alphanumeric()) {
            self.countries.bump(&country.to_ascii_uppercase());
        } else {
            self.countries.bump(UNKNOWN_COUNTRY);
        }
    }

    pub fn record_bytes(&mut self, bytes: u64) {
        self.record_bytes_in(bytes, current_month());
    }

    fn record_bytes_in(&mut self, bytes: u64, month: (i32, u32)) {
        if month != self.month_key {
            self.month_key = month;
            self.bandwidth.month = 0;
        }
        self.bandwidth.total = self.bandwidth.total.saturating_add(bytes);
        self.bandwidth.month = self.bandwidth.month.saturating_add(bytes);
    }

    #[must_use]
    pub const fn total_requests(&self) -> u64 {
        self.total_requests
    }

    #[must_use]
    pub fn report(&self) -> AnalyticsReport {
        AnalyticsReport {
            top_sites: self
                .sites
                .top(TOP_SITES)
                .into_iter()
                .map(|(url, count)| SiteCount { url, count })
                .collect(),
            geo_stats: self
                .countries
                .top(TOP_COUNTRIES)
                .into_iter()
                .map(|(country, count)| CountryCount { country, count })
                .collect(),
            bandwidth: self.bandwidth,
        }
    }
}

fn current_month() -> (i32, u32) {
    let now = Utc::now();
    (now.year(), now.month())
}
