#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coarse crime-group taxonomy.
//!
//! NIBRS offense categories are far too fine-grained to be useful as a
//! classification target, so every offense is collapsed into one of six
//! [`CrimeGroup`]s. The group is the label the downstream classifier
//! predicts.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Top-level crime groupings used as the prediction label.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum CrimeGroup {
    /// Assaults and sex offenses
    #[serde(rename = "Assault/Sex")]
    #[strum(serialize = "Assault/Sex")]
    AssaultSex,
    /// Theft, fraud, burglary and embezzlement
    #[serde(rename = "Theft/Fraud")]
    #[strum(serialize = "Theft/Fraud")]
    TheftFraud,
    /// Drug and weapon offenses
    #[serde(rename = "Drug/Weapon")]
    #[strum(serialize = "Drug/Weapon")]
    DrugWeapon,
    /// Vandalism and arson
    #[serde(rename = "Property Damage")]
    #[strum(serialize = "Property Damage")]
    PropertyDamage,
    /// Homicide, kidnapping and robbery
    #[serde(rename = "Violent")]
    #[strum(serialize = "Violent")]
    Violent,
    /// Everything that doesn't match a more specific group
    #[serde(rename = "Other")]
    #[strum(serialize = "Other")]
    Other,
}

impl CrimeGroup {
    /// Maps a NIBRS offense category name (e.g. `"Larceny/Theft Offenses"`)
    /// to its coarse group.
    ///
    /// Rules are checked in order and matching is case-sensitive on the
    /// keyword, so `"Robbery"` lands in [`Self::Violent`] but a category
    /// containing both `"Assault"` and `"Robbery"` lands in
    /// [`Self::AssaultSex`].
    #[must_use]
    pub fn from_category(category: &str) -> Self {
        if contains_any(category, &["Assault", "Sex Offense"]) {
            return Self::AssaultSex;
        }
        if contains_any(category, &["Theft", "Fraud", "Burglary", "Embezzlement"]) {
            return Self::TheftFraud;
        }
        if contains_any(category, &["Drug", "Weapon"]) {
            return Self::DrugWeapon;
        }
        if contains_any(category, &["Vandalism", "Arson"]) {
            return Self::PropertyDamage;
        }
        if contains_any(category, &["Homicide", "Kidnapping", "Robbery"]) {
            return Self::Violent;
        }
        Self::Other
    }

    /// Same as [`Self::from_category`], treating a missing category as
    /// [`Self::Other`].
    #[must_use]
    pub fn from_optional_category(category: Option<&str>) -> Self {
        category.map_or(Self::Other, Self::from_category)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::AssaultSex,
            Self::TheftFraud,
            Self::DrugWeapon,
            Self::PropertyDamage,
            Self::Violent,
            Self::Other,
        ]
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
