//! # Destination Catalog
//!
//! The canonical, ordered destination list and the mapping between a
//! destination's string id and its position in that list.
//!
//! The remote profile stores favorites and explorations as positions, the
//! local cache stores them as string ids. The two are only consistent while
//! the catalog order is unchanged: reordering the catalog makes previously
//! stored positions point at different destinations.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Opaque, catalog-scoped destination identifier (string-id form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationRef(String);

impl DestinationRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DestinationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationRef {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DestinationRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for DestinationRef {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DestinationRef {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Destination category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    #[default]
    CulturalImmersion,
    NatureEco,
    FoodTrails,
    VillageStays,
}

/// Per-dimension trust scores shown on a destination's trust breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TrustBreakdown {
    pub verification_score: f32,
    pub safety_compliance: f32,
    pub community_rating: f32,
    pub experience_authenticity: f32,
}

/// A destination entry in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: DestinationRef,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub trust_score: f32,
    #[serde(default)]
    pub verified_host_count: u32,
    #[serde(default)]
    pub safety_certified: bool,
    #[serde(default)]
    pub story: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub trust_breakdown: TrustBreakdown,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Destination {
    /// Create a destination with only an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: DestinationRef::new(id),
            name: name.into(),
            region: String::new(),
            state: String::new(),
            trust_score: 0.0,
            verified_host_count: 0,
            safety_certified: false,
            story: String::new(),
            category: Category::default(),
            trust_breakdown: TrustBreakdown::default(),
            tags: Vec::new(),
        }
    }
}

/// The canonical, ordered destination list.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    destinations: Vec<Destination>,
}

impl Catalog {
    pub fn new(destinations: Vec<Destination>) -> Self {
        Self { destinations }
    }

    /// Build a catalog of bare entries, one per id, in the given order.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let destinations = ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                Destination::new(id.clone(), id)
            })
            .collect();
        Self { destinations }
    }

    /// Parse a catalog from a JSON array of destinations.
    pub fn from_json(json: &str) -> Result<Self> {
        let destinations: Vec<Destination> =
            serde_json::from_str(json).map_err(|e| SyncError::Serialization {
                key: "catalog".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { destinations })
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn ids(&self) -> Vec<DestinationRef> {
        self.destinations.iter().map(|d| d.id.clone()).collect()
    }

    /// Position of `id` in the catalog (first match).
    pub fn index_of(&self, id: &DestinationRef) -> Option<usize> {
        self.destinations.iter().position(|d| &d.id == id)
    }

    /// Ref stored at `index`. Out of range is a miss, not an error.
    pub fn ref_at(&self, index: u64) -> Option<DestinationRef> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.destinations.get(i))
            .map(|d| d.id.clone())
    }

    /// Like [`Catalog::ref_at`] but reports the miss.
    pub fn try_ref_at(&self, index: u64) -> Result<DestinationRef> {
        self.ref_at(index).ok_or(SyncError::IndexOutOfRange {
            index,
            len: self.destinations.len(),
        })
    }

    /// Map remote positions to refs, dropping stale positions.
    pub fn resolve_indices(&self, indices: &[u64]) -> Vec<DestinationRef> {
        indices
            .iter()
            .filter_map(|&i| match self.try_ref_at(i) {
                Ok(id) => Some(id),
                Err(e) => {
                    debug!("[Catalog] Dropping stale position: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, id: &DestinationRef) -> Option<&Destination> {
        self.destinations.iter().find(|d| &d.id == id)
    }

    pub fn contains(&self, id: &DestinationRef) -> bool {
        self.index_of(id).is_some()
    }

    pub fn by_category(&self, category: Category) -> Vec<&Destination> {
        self.destinations
            .iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// Explore-screen filter: case-insensitive name or region search, optional
    /// category and a minimum trust score. An empty query matches everything.
    pub fn search(
        &self,
        query: &str,
        category: Option<Category>,
        min_trust: f32,
    ) -> Vec<&Destination> {
        let needle = query.trim().to_lowercase();
        self.destinations
            .iter()
            .filter(|d| {
                needle.is_empty()
                    || d.name.to_lowercase().contains(&needle)
                    || d.region.to_lowercase().contains(&needle)
            })
            .filter(|d| category.map_or(true, |c| d.category == c))
            .filter(|d| d.trust_score >= min_trust)
            .collect()
    }
}
