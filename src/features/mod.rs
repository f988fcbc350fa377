//! Visual attributes, their closed vocabularies and the per-image feature set.

pub mod extractor;
pub mod matcher;

pub use extractor::AttributeExtractor;
pub use matcher::{LabelMatcher, VocabularyMatcher};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label meaning "this attribute is absent". Doubles as the asset sentinel.
pub const NONE_LABEL: &str = "none";
pub const UNKNOWN_LABEL: &str = "unknown";

/// One of the three classified visual properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    HairColor,
    CapColor,
    TopStyle,
}

impl Attribute {
    /// Extraction and layering order.
    pub const ALL: [Attribute; 3] = [
        Attribute::HairColor,
        Attribute::CapColor,
        Attribute::TopStyle,
    ];

    /// Key used in the serialized feature set.
    pub fn key(self) -> &'static str {
        match self {
            Attribute::HairColor => "hair_color",
            Attribute::CapColor => "cap_color",
            Attribute::TopStyle => "top_style",
        }
    }

    /// Asset directory holding this attribute's overlay images.
    pub fn layer(self) -> &'static str {
        match self {
            Attribute::HairColor => "hair",
            Attribute::CapColor => "cap",
            Attribute::TopStyle => "top",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Attribute::HairColor => "What is the hair color? Answer with one word.",
            Attribute::CapColor => {
                "If the person wears a hat or cap, what color is it? If none, answer 'none'."
            }
            Attribute::TopStyle => {
                "Describe the style of the top (e.g., t-shirt, hoodie, jacket) in one word."
            }
        }
    }

    pub fn vocabulary(self) -> &'static Vocabulary {
        match self {
            Attribute::HairColor => &HAIR_COLORS,
            Attribute::CapColor => &CAP_COLORS,
            Attribute::TopStyle => &TOP_STYLES,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A closed label set with its fallback and free-text aliases.
#[derive(Debug)]
pub struct Vocabulary {
    pub labels: &'static [&'static str],
    pub fallback: &'static str,
    /// `(needle, label)` pairs tried in order when no token matched.
    pub aliases: &'static [(&'static str, &'static str)],
}

impl Vocabulary {
    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(&label)
    }

    /// Whether `label` is a value this vocabulary can produce.
    pub fn accepts(&self, label: &str) -> bool {
        self.contains(label) || label == self.fallback
    }
}

pub static HAIR_COLORS: Vocabulary = Vocabulary {
    labels: &["black", "brown", "blonde", "red", "gray", "white"],
    fallback: UNKNOWN_LABEL,
    aliases: &[],
};

pub static CAP_COLORS: Vocabulary = Vocabulary {
    labels: &["black", "white", "red", "blue", "green", "yellow", NONE_LABEL],
    fallback: NONE_LABEL,
    aliases: &[],
};

pub static TOP_STYLES: Vocabulary = Vocabulary {
    labels: &["t-shirt", "hoodie", "jacket", "sweater", "shirt", NONE_LABEL],
    fallback: UNKNOWN_LABEL,
    aliases: &[
        ("tshirt", "t-shirt"),
        ("t shirt", "t-shirt"),
        ("sweatshirt", "sweater"),
    ],
};

/// Per-image classification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub hair_color: String,
    pub cap_color: String,
    pub top_style: String,
}

impl FeatureSet {
    pub fn new(
        hair_color: impl Into<String>,
        cap_color: impl Into<String>,
        top_style: impl Into<String>,
    ) -> Self {
        Self {
            hair_color: hair_color.into(),
            cap_color: cap_color.into(),
            top_style: top_style.into(),
        }
    }

    pub fn get(&self, attribute: Attribute) -> &str {
        match attribute {
            Attribute::HairColor => &self.hair_color,
            Attribute::CapColor => &self.cap_color,
            Attribute::TopStyle => &self.top_style,
        }
    }
}
