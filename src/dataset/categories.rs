//! Category dictionaries for categorical features.
//!
//! A [`CatContainer`] holds, for every feature, either nothing (numerical
//! feature) or the ordered list of category names. A category is stored in the
//! canonical page as its position in that list.

use crate::core::error::Result;
use crate::core::types::FeatureType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};

/// Per-feature category dictionaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatContainer {
    features: Vec<Option<Vec<String>>>,
}

impl CatContainer {
    /// Create a container from per-feature dictionaries.
    pub fn new(features: Vec<Option<Vec<String>>>) -> Self {
        CatContainer { features }
    }

    /// Whether any feature is categorical.
    pub fn has_categorical(&self) -> bool {
        self.features.iter().any(Option::is_some)
    }

    /// Number of features described.
    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Whether feature `f` is categorical.
    pub fn is_categorical(&self, f: usize) -> bool {
        matches!(self.features.get(f), Some(Some(_)))
    }

    /// Number of categories of feature `f`, 0 for numerical features.
    pub fn num_categories(&self, f: usize) -> usize {
        self.categories(f).map_or(0, <[String]>::len)
    }

    /// Dictionary of feature `f`.
    pub fn categories(&self, f: usize) -> Option<&[String]> {
        self.features.get(f).and_then(|c| c.as_deref())
    }

    /// Code of category `name` in feature `f`.
    pub fn encode(&self, f: usize, name: &str) -> Option<f32> {
        self.categories(f)?
            .iter()
            .position(|c| c == name)
            .map(|p| p as f32)
    }

    /// Map codes expressed against `source` onto this container's dictionary
    /// of feature `f`. Unknown or negative codes become NaN.
    pub fn recode(&self, f: usize, source: &[String], codes: &[i32]) -> Vec<f32> {
        let lookup: HashMap<&str, usize> = self
            .categories(f)
            .unwrap_or(&[])
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        codes
            .iter()
            .map(|&code| {
                usize::try_from(code)
                    .ok()
                    .and_then(|c| source.get(c))
                    .and_then(|name| lookup.get(name.as_str()))
                    .map_or(f32::NAN, |&i| i as f32)
            })
            .collect()
    }

    /// Feature types implied by the dictionaries.
    pub fn feature_types(&self) -> Vec<FeatureType> {
        self.features
            .iter()
            .map(|c| match c {
                Some(_) => FeatureType::Categorical,
                None => FeatureType::Numerical,
            })
            .collect()
    }

    /// Deep copy, detached from any sharing.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Write the binary form.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Read the binary form.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(bincode::deserialize_from(reader)?)
    }

    /// JSON export.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// JSON import.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Bytes identifying the dictionaries, compared across workers.
    pub fn fingerprint(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}
