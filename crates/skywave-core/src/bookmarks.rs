//! Bookmark document parsing (spec §6 persisted state).
//!
//! The core only reads this document through the scanner; a separate
//! collaborator (outside this crate) owns GET/POST persistence.

use crate::scanner::ScanEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub frequency: u64,
    pub mode: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkDocument {
    pub categories: Vec<Category>,
}

impl BookmarkDocument {
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Flattens every category into scanner entries, optionally restricted
    /// to a single category name.
    pub fn to_scan_entries(&self, category: Option<&str>) -> Vec<ScanEntry> {
        self.categories
            .iter()
            .filter(|c| category.is_none_or(|want| want == c.name))
            .flat_map(|c| {
                c.stations.iter().map(|s| ScanEntry {
                    freq_hz: s.frequency,
                    mode: s.mode.clone(),
                    label: s.label.clone(),
                    category: c.name.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "categories": [
            {"name": "amateur", "stations": [
                {"frequency": 146520000, "mode": "FM", "label": "2m calling"}
            ]},
            {"name": "pagers", "stations": [
                {"frequency": 152007500, "mode": "NFM", "label": "hospital"}
            ]}
        ]
    }"#;

    #[test]
    fn parses_categories_and_stations() {
        let doc = BookmarkDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.categories.len(), 2);
        assert_eq!(doc.categories[0].stations[0].frequency, 146_520_000);
    }

    #[test]
    fn flattens_all_categories_when_unfiltered() {
        let doc = BookmarkDocument::parse(SAMPLE).unwrap();
        let entries = doc.to_scan_entries(None);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn filters_by_category_name() {
        let doc = BookmarkDocument::parse(SAMPLE).unwrap();
        let entries = doc.to_scan_entries(Some("pagers"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "hospital");
    }
}
