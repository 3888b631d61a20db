/// Placeholder image selection
///
/// Used whenever real generation is unavailable or fails. Keyword rules are
/// scanned in order against the lower-cased description and the first match
/// wins; descriptions matching no rule draw from a small default pool.
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

const NIGHT_SCENE_URL: &str =
    "https://images.pexels.com/photos/1002638/pexels-photo-1002638.jpeg?auto=compress&cs=tinysrgb&w=800";
const FOREST_URL: &str =
    "https://images.pexels.com/photos/1496373/pexels-photo-1496373.jpeg?auto=compress&cs=tinysrgb&w=800";
const CITY_URL: &str =
    "https://images.pexels.com/photos/1519088/pexels-photo-1519088.jpeg?auto=compress&cs=tinysrgb&w=800";
const MOUNTAIN_URL: &str =
    "https://images.pexels.com/photos/1624496/pexels-photo-1624496.jpeg?auto=compress&cs=tinysrgb&w=800";
const OCEAN_URL: &str =
    "https://images.pexels.com/photos/1001682/pexels-photo-1001682.jpeg?auto=compress&cs=tinysrgb&w=800";

/// Pool used when no keyword matches.
pub const DEFAULT_POOL: [&str; 3] = [FOREST_URL, NIGHT_SCENE_URL, CITY_URL];

/// Themed placeholder bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackBucket {
    NightScene,
    Forest,
    City,
    Mountain,
    Ocean,
}

impl FallbackBucket {
    pub fn url(&self) -> &'static str {
        match self {
            Self::NightScene => NIGHT_SCENE_URL,
            Self::Forest => FOREST_URL,
            Self::City => CITY_URL,
            Self::Mountain => MOUNTAIN_URL,
            Self::Ocean => OCEAN_URL,
        }
    }
}

impl std::fmt::Display for FallbackBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NightScene => write!(f, "night-scene"),
            Self::Forest => write!(f, "forest"),
            Self::City => write!(f, "city"),
            Self::Mountain => write!(f, "mountain"),
            Self::Ocean => write!(f, "ocean"),
        }
    }
}

/// Keywords mapped to a bucket
#[derive(Debug, Clone, Copy)]
pub struct FallbackRule {
    pub keywords: &'static [&'static str],
    pub bucket: FallbackBucket,
}

const RULES: [FallbackRule; 5] = [
    FallbackRule {
        keywords: &["ninja", "cat", "night", "moon"],
        bucket: FallbackBucket::NightScene,
    },
    FallbackRule {
        keywords: &["forest", "tree", "nature"],
        bucket: FallbackBucket::Forest,
    },
    FallbackRule {
        keywords: &["city", "urban", "building"],
        bucket: FallbackBucket::City,
    },
    FallbackRule {
        keywords: &["mountain", "landscape"],
        bucket: FallbackBucket::Mountain,
    },
    FallbackRule {
        keywords: &["ocean", "sea", "water"],
        bucket: FallbackBucket::Ocean,
    },
];

/// What the selector picked and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChoice {
    pub url: String,
    /// `None` when the default pool was used.
    pub bucket: Option<FallbackBucket>,
}

/// Deterministic placeholder chooser
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackSelector;

impl FallbackSelector {
    pub fn new() -> Self {
        Self
    }

    pub fn rules(&self) -> &'static [FallbackRule] {
        &RULES
    }

    /// First bucket whose keywords occur in `description`, if any.
    pub fn bucket_for(&self, description: &str) -> Option<FallbackBucket> {
        let lower = description.to_lowercase();
        RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lower.contains(k)))
            .map(|rule| rule.bucket)
    }

    pub fn select(&self, description: &str) -> FallbackChoice {
        self.select_with_rng(description, &mut rand::thread_rng())
    }

    pub fn select_with_rng<R: Rng + ?Sized>(&self, description: &str, rng: &mut R) -> FallbackChoice {
        match self.bucket_for(description) {
            Some(bucket) => FallbackChoice {
                url: bucket.url().to_string(),
                bucket: Some(bucket),
            },
            None => FallbackChoice {
                url: DEFAULT_POOL
                    .choose(rng)
                    .copied()
                    .unwrap_or(DEFAULT_POOL[0])
                    .to_string(),
                bucket: None,
            },
        }
    }
}
