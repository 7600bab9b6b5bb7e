//! Loading of command-line dataset arguments.

use std::path::PathBuf;
use std::str::FromStr;

use spatial_indicators_indicator_models::{Dataset, DatasetCatalog};

/// A dataset given as `<id>[:<name>]=<path>`.
///
/// The name defaults to the id, so strategies can reference the dataset
/// by either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetArg {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for DatasetArg {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (reference, path) = raw
            .split_once('=')
            .ok_or_else(|| format!("expected <id>[:<name>]=<path>, got '{raw}'"))?;
        let (id, name) = reference.split_once(':').unwrap_or((reference, reference));
        let (id, name, path) = (id.trim(), name.trim(), path.trim());
        if id.is_empty() || name.is_empty() || path.is_empty() {
            return Err(format!("empty id, name or path in '{raw}'"));
        }
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// Reads every dataset file into one catalog.
///
/// # Errors
///
/// Fails if a file cannot be read or parsed, or if two datasets share an
/// id or name.
pub fn load_catalog(args: &[DatasetArg]) -> Result<DatasetCatalog, Box<dyn std::error::Error>> {
    let mut catalog = DatasetCatalog::new();
    for arg in args {
        let features = spatial_indicators_io::read_collection(&arg.path)?;
        log::info!(
            "Loaded dataset '{}' ({} features) from {}",
            arg.id,
            features.len(),
            arg.path.display()
        );
        catalog.insert(Dataset::new(arg.id.clone(), arg.name.clone(), features))?;
    }
    Ok(catalog)
}
