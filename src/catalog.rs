//! Versioned segment catalog: label → description and marketing strategy.
//!
//! The catalog version is chosen once at construction. A classifier artifact
//! declares the version it was fit against and refuses to load against a
//! different one, so the two label spaces can never be mixed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Which segment taxonomy is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogVersion {
    Five,
    Six,
}

impl CatalogVersion {
    pub fn segment_count(self) -> usize {
        self.definitions().len()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CatalogVersion::Five => "five",
            CatalogVersion::Six => "six",
        }
    }

    fn definitions(self) -> &'static [Entry] {
        match self {
            CatalogVersion::Five => FIVE_SEGMENTS,
            CatalogVersion::Six => SIX_SEGMENTS,
        }
    }
}

impl fmt::Display for CatalogVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "five" | "5" => Ok(CatalogVersion::Five),
            "six" | "6" => Ok(CatalogVersion::Six),
            other => Err(ConfigError::CatalogVersion(other.to_string())),
        }
    }
}

/// Segment identifier. Produced by the classifier or read back from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SegmentLabel(u8);

impl SegmentLabel {
    pub(crate) fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-facing text for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentDefinition {
    pub label: SegmentLabel,
    pub name: &'static str,
    pub description: &'static str,
    pub strategy: &'static str,
}

struct Entry {
    name: &'static str,
    description: &'static str,
    strategy: &'static str,
}

static UNKNOWN: Entry = Entry {
    name: "Unknown group",
    description: "This label is not part of the active segment catalog.",
    strategy: "No strategy available.",
};

static FIVE_SEGMENTS: &[Entry] = &[
    Entry {
        name: "Loyal middle-aged regulars",
        description: "A middle-aged customer who shows strong loyalty to the store.",
        strategy: "Long-term customer care and tailored benefits.",
    },
    Entry {
        name: "Young new customers (low review ratings)",
        description: "A younger customer with little brand experience so far, leaving low review ratings.",
        strategy: "Improve satisfaction, manage reviews, and nudge with early-purchase discounts.",
    },
    Entry {
        name: "Budget-conscious customers",
        description: "A price-sensitive customer who mostly prefers low-priced products.",
        strategy: "Recommend good-value products and lean on promotions.",
    },
    Entry {
        name: "High-spending VIP customers",
        description: "A VIP customer who frequently buys high-priced products.",
        strategy: "Recommend premium products and strengthen VIP benefits.",
    },
    Entry {
        name: "Conservative middle-aged customers",
        description: "A middle-aged customer who prefers familiar products over new ones.",
        strategy: "Trust-based marketing centred on the existing product line.",
    },
];

static SIX_SEGMENTS: &[Entry] = &[
    Entry {
        name: "Loyal regulars",
        description: "A long-standing customer with many previous purchases and steady ratings.",
        strategy: "Loyalty rewards and early access to new collections.",
    },
    Entry {
        name: "Young newcomers",
        description: "A young customer with few previous purchases and below-average ratings.",
        strategy: "Onboarding offers, review follow-ups, and satisfaction surveys.",
    },
    Entry {
        name: "Bargain hunters",
        description: "A customer whose purchases cluster at the low end of the price range.",
        strategy: "Bundle deals, clearance alerts, and value-focused recommendations.",
    },
    Entry {
        name: "VIP big spenders",
        description: "A customer with consistently high purchase amounts.",
        strategy: "Premium recommendations, concierge service, and exclusive events.",
    },
    Entry {
        name: "Conservative repeat buyers",
        description: "An older customer who repurchases familiar products.",
        strategy: "Replenishment reminders and trust-based messaging.",
    },
    Entry {
        name: "Seasonal occasional shoppers",
        description: "A customer who buys rarely, concentrated around a single season.",
        strategy: "Seasonal campaigns and reactivation reminders ahead of peak season.",
    },
];

/// Pure lookup table for one catalog version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentCatalog {
    version: CatalogVersion,
}

impl SegmentCatalog {
    pub fn new(version: CatalogVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> CatalogVersion {
        self.version
    }

    pub fn len(&self) -> usize {
        self.version.segment_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, label: SegmentLabel) -> bool {
        (label.value() as usize) < self.len()
    }

    /// Every label of this catalog, ascending.
    pub fn labels(&self) -> impl Iterator<Item = SegmentLabel> {
        (0..self.len()).map(|i| SegmentLabel::new(i as u8))
    }

    /// Definition for `label`; out-of-range labels get the "unknown group" text.
    pub fn describe(&self, label: SegmentLabel) -> SegmentDefinition {
        let entry = self
            .version
            .definitions()
            .get(label.value() as usize)
            .unwrap_or(&UNKNOWN);

        SegmentDefinition {
            label,
            name: entry.name,
            description: entry.description,
            strategy: entry.strategy,
        }
    }

    pub fn definitions(&self) -> Vec<SegmentDefinition> {
        self.labels().map(|label| self.describe(label)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_counts() {
        assert_eq!(SegmentCatalog::new(CatalogVersion::Five).len(), 5);
        assert_eq!(SegmentCatalog::new(CatalogVersion::Six).len(), 6);
    }

    #[test]
    fn test_describe_known_label() {
        let catalog = SegmentCatalog::new(CatalogVersion::Five);
        let definition = catalog.describe(SegmentLabel::new(3));

        assert_eq!(definition.label.value(), 3);
        assert_eq!(definition.name, "High-spending VIP customers");
        assert!(definition.strategy.contains("VIP"));
    }

    #[test]
    fn test_describe_out_of_range_label() {
        let catalog = SegmentCatalog::new(CatalogVersion::Five);
        let label = SegmentLabel::new(5);

        assert!(!catalog.contains(label));
        assert_eq!(catalog.describe(label).name, "Unknown group");
        assert!(SegmentCatalog::new(CatalogVersion::Six).contains(label));
    }

    #[test]
    fn test_labels_are_ascending_and_complete() {
        let catalog = SegmentCatalog::new(CatalogVersion::Six);
        let labels: Vec<u8> = catalog.labels().map(SegmentLabel::value).collect();
        assert_eq!(labels, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!("five".parse::<CatalogVersion>(), Ok(CatalogVersion::Five));
        assert_eq!(" SIX ".parse::<CatalogVersion>(), Ok(CatalogVersion::Six));
        assert_eq!("6".parse::<CatalogVersion>(), Ok(CatalogVersion::Six));
        assert!("seven".parse::<CatalogVersion>().is_err());
    }
}
