//! Named base-indicator and georesource datasets.

use std::collections::BTreeMap;

use crate::{FeatureCollection, ModelError};

/// A feature collection addressable by a stable id or a human-readable
/// name.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Stable identifier (e.g. a UUID from the data management service).
    pub id: String,
    /// Human-readable name (e.g. `"Residential buildings"`).
    pub name: String,
    /// The dataset's features.
    pub features: FeatureCollection,
}

impl Dataset {
    /// Creates a dataset.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, features: FeatureCollection) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            features,
        }
    }
}

/// A set of datasets resolvable by id or name.
///
/// Both references of a dataset resolve to the same entry. Ids take
/// precedence when a reference could match both an id and a name.
#[derive(Debug, Clone, Default)]
pub struct DatasetCatalog {
    datasets: BTreeMap<String, Dataset>,
    names: BTreeMap<String, String>,
}

impl DatasetCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateDataset`] if the id or the name is
    /// already taken.
    pub fn insert(&mut self, dataset: Dataset) -> Result<(), ModelError> {
        if self.datasets.contains_key(&dataset.id) {
            return Err(ModelError::DuplicateDataset {
                reference: dataset.id,
            });
        }
        if self.names.contains_key(&dataset.name) {
            return Err(ModelError::DuplicateDataset {
                reference: dataset.name,
            });
        }
        self.names.insert(dataset.name.clone(), dataset.id.clone());
        self.datasets.insert(dataset.id.clone(), dataset);
        Ok(())
    }

    /// Resolves a dataset by id or name.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<&Dataset> {
        self.datasets.get(reference).or_else(|| {
            self.names
                .get(reference)
                .and_then(|id| self.datasets.get(id))
        })
    }

    /// Number of registered datasets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
