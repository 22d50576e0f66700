use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::stat_error::{StatError, StatResult};

/// Manifest naming the data files a [`Catalog`](crate::catalog::Catalog) is built from.
///
/// ```json
/// {
///     "storeKinds": ["CharStats", "WeaponStats"],
///     "featureSets": "features.txt",
///     "items": "items.json",
///     "bullets": "bullets.json",
///     "dropPools": "pools.json"
/// }
/// ```
///
/// Store kinds get their ids in listed order. Every file is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogConfig {
    pub store_kinds: Vec<String>,
    pub feature_sets: Option<PathBuf>,
    pub items: Option<PathBuf>,
    pub bullets: Option<PathBuf>,
    pub drop_pools: Option<PathBuf>,
}

impl CatalogConfig {
    pub fn from_json(json: &str) -> StatResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a manifest file. Relative data paths are taken relative to the manifest's
    /// own directory.
    pub fn from_path(path: impl AsRef<Path>) -> StatResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| StatError::io(path, err))?;
        let mut config = Self::from_json(&text)?;
        if let Some(dir) = path.parent() {
            config.rebase(dir);
        }
        Ok(config)
    }

    /// Prefixes every relative data path with `dir`.
    pub fn rebase(&mut self, dir: &Path) {
        for file in [&mut self.feature_sets, &mut self.items, &mut self.bullets, &mut self.drop_pools] {
            if let Some(relative) = file.as_mut().filter(|p| p.is_relative()) {
                *relative = dir.join(&*relative);
            }
        }
    }

    pub fn with_store_kinds<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.store_kinds.extend(names.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default() {
        let config = CatalogConfig::from_json(r#"{ "storeKinds": ["CharStats"], "items": "items.json" }"#).unwrap();
        assert_eq!(config.store_kinds, vec!["CharStats".to_string()]);
        assert_eq!(config.items, Some(PathBuf::from("items.json")));
        assert!(config.feature_sets.is_none());
        assert!(config.drop_pools.is_none());
    }

    #[test]
    fn rebase_only_touches_relative_paths() {
        let mut config = CatalogConfig {
            items: Some(PathBuf::from("items.json")),
            bullets: Some(PathBuf::from("/abs/bullets.json")),
            ..Default::default()
        };
        config.rebase(Path::new("/data"));
        assert_eq!(config.items, Some(PathBuf::from("/data/items.json")));
        assert_eq!(config.bullets, Some(PathBuf::from("/abs/bullets.json")));
    }

    #[test]
    fn malformed_manifest_is_a_json_error() {
        assert!(matches!(CatalogConfig::from_json("{ storeKinds: }"), Err(StatError::Json(_))));
    }
}
