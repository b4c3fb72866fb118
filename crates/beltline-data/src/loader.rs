//! Resolution pipeline: reads data files, resolves names, builds the catalog.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_factory_data`], which ties them
//! together for a data directory.

use crate::schema::{CatalogData, RecipeEntryData};
use beltline_core::catalog::{Catalog, CatalogBuilder, CatalogError, RecipeEntry};
use beltline_core::config::TransportConfig;
use beltline_core::id::{ItemTypeId, RecipeId};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The resolved catalog failed validation.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let extensions = ["ron", "toml", "json"];
    let mut found: Option<PathBuf> = None;

    for ext in &extensions {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// Everything a factory needs from its data directory.
#[derive(Debug, Clone)]
pub struct FactoryData {
    pub catalog: Catalog,
    pub transport: TransportConfig,
}

impl FactoryData {
    pub fn into_parts(self) -> (Catalog, TransportConfig) {
        (self.catalog, self.transport)
    }
}

/// Load `catalog.*` (required) and `transport.*` (optional, defaults
/// otherwise) from `dir`.
pub fn load_factory_data(dir: &Path) -> Result<FactoryData, DataLoadError> {
    let catalog_path = require_data_file(dir, "catalog")?;
    let data: CatalogData = deserialize_file(&catalog_path)?;
    let catalog = build_catalog(&data, &catalog_path)?;

    let transport = match find_data_file(dir, "transport")? {
        Some(path) => deserialize_file(&path)?,
        None => {
            log::debug!("no transport file in {}, using defaults", dir.display());
            TransportConfig::default()
        }
    };

    log::debug!(
        "loaded {} items and {} recipes from {}",
        catalog.item_count(),
        catalog.recipe_count(),
        catalog_path.display()
    );
    Ok(FactoryData { catalog, transport })
}

/// Resolve item names in recipes and build the catalog.
pub(crate) fn build_catalog(data: &CatalogData, path: &Path) -> Result<Catalog, DataLoadError> {
    let mut builder = CatalogBuilder::new();

    let mut item_names: HashMap<String, ItemTypeId> = HashMap::new();
    for item in &data.items {
        check_duplicate(&item_names, &item.name, path)?;
        let sprite = item
            .sprite
            .clone()
            .unwrap_or_else(|| format!("items/{}", item.name));
        let id = builder.register_item(&item.name, &sprite, item.stack_size);
        item_names.insert(item.name.clone(), id);
    }

    let mut recipe_names: HashMap<String, RecipeId> = HashMap::new();
    for recipe in &data.recipes {
        check_duplicate(&recipe_names, &recipe.name, path)?;
        let inputs = resolve_entries(&recipe.inputs, &item_names, path)?;
        let outputs = resolve_entries(&recipe.outputs, &item_names, path)?;
        let id = builder.register_recipe(&recipe.name, inputs, outputs, recipe.duration);
        recipe_names.insert(recipe.name.clone(), id);
    }

    Ok(builder.build()?)
}

fn resolve_entries(
    entries: &[RecipeEntryData],
    item_names: &HashMap<String, ItemTypeId>,
    path: &Path,
) -> Result<Vec<RecipeEntry>, DataLoadError> {
    entries
        .iter()
        .map(|entry| {
            let item = resolve_name(item_names, entry.item(), path, "item")?;
            Ok(RecipeEntry {
                item: *item,
                quantity: entry.quantity(),
            })
        })
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "beltline_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const CATALOG_RON: &str = r#"(
        items: [
            (name: "iron_plate", stack_size: 100),
            (name: "iron_gear"),
        ],
        recipes: [
            (name: "iron_gear", inputs: [("iron_plate", 2)], outputs: [("iron_gear", 1)], duration: 30),
        ],
    )"#;

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("catalog.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("catalog.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("catalog.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        for name in ["catalog.yaml", "catalog"] {
            assert!(matches!(
                detect_format(Path::new(name)),
                Err(DataLoadError::UnsupportedFormat { .. })
            ));
        }
    }

    // -----------------------------------------------------------------------
    // find_data_file / require_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_found_and_missing() {
        let dir = make_test_dir("find");
        assert_eq!(find_data_file(&dir, "catalog").unwrap(), None);

        fs::write(dir.join("catalog.toml"), "").unwrap();
        assert_eq!(
            find_data_file(&dir, "catalog").unwrap(),
            Some(dir.join("catalog.toml"))
        );

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("catalog.ron"), "()").unwrap();
        fs::write(dir.join("catalog.json"), "{}").unwrap();

        let result = find_data_file(&dir, "catalog");
        assert!(matches!(
            result,
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");

        let result = require_data_file(&dir, "catalog");
        assert!(matches!(result, Err(DataLoadError::MissingRequired { ref file, .. }) if file == "catalog"));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // deserialize_file
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_file_parse_error() {
        let dir = make_test_dir("deser_parse_err");
        let path = dir.join("catalog.ron");
        fs::write(&path, "this is not valid RON {{{").unwrap();

        let result: Result<CatalogData, _> = deserialize_file(&path);
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // load_factory_data
    // -----------------------------------------------------------------------

    #[test]
    fn load_ron_catalog_with_default_transport() {
        let dir = make_test_dir("load_ron");
        fs::write(dir.join("catalog.ron"), CATALOG_RON).unwrap();

        let (catalog, transport) = load_factory_data(&dir).unwrap().into_parts();
        assert_eq!(catalog.item_count(), 2);
        assert_eq!(catalog.recipe_count(), 1);
        let plate = catalog.item_id("iron_plate").unwrap();
        let gear = catalog.item_id("iron_gear").unwrap();
        assert_eq!(catalog.stack_size(plate), 100);
        assert_eq!(catalog.item(gear).unwrap().sprite, "items/iron_gear");
        let recipe = catalog.recipe(catalog.recipe_id("iron_gear").unwrap()).unwrap();
        assert_eq!(recipe.input_quantity(plate), 2);
        assert_eq!(recipe.duration, 30);
        assert_eq!(transport, TransportConfig::default());

        cleanup(&dir);
    }

    #[test]
    fn load_json_catalog_and_toml_transport() {
        let dir = make_test_dir("load_mixed");
        fs::write(
            dir.join("catalog.json"),
            r#"{"items": [{"name": "ore", "stack_size": 10}]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("transport.toml"),
            "transport_constant = 0.25\nreceive_cooldown_frames = 4\n",
        )
        .unwrap();

        let data = load_factory_data(&dir).unwrap();
        assert_eq!(data.catalog.item_count(), 1);
        assert_eq!(data.transport.transport_constant, 0.25);
        assert_eq!(data.transport.receive_cooldown_frames, 4);
        // Unspecified keys keep their defaults.
        assert_eq!(data.transport.fast_speed, TransportConfig::default().fast_speed);

        cleanup(&dir);
    }

    #[test]
    fn load_rejects_unknown_recipe_item() {
        let dir = make_test_dir("load_unresolved");
        fs::write(
            dir.join("catalog.ron"),
            r#"(items: [(name: "ore")], recipes: [(name: "r", inputs: [("dust", 1)], outputs: [("ore", 1)], duration: 5)])"#,
        )
        .unwrap();

        let result = load_factory_data(&dir);
        assert!(matches!(
            result,
            Err(DataLoadError::UnresolvedRef { ref name, expected_kind: "item", .. }) if name == "dust"
        ));

        cleanup(&dir);
    }

    #[test]
    fn load_rejects_duplicate_item() {
        let dir = make_test_dir("load_duplicate");
        fs::write(
            dir.join("catalog.json"),
            r#"{"items": [{"name": "ore"}, {"name": "ore"}]}"#,
        )
        .unwrap();

        let result = load_factory_data(&dir);
        assert!(matches!(
            result,
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "ore"
        ));

        cleanup(&dir);
    }

    #[test]
    fn load_surfaces_catalog_validation() {
        let dir = make_test_dir("load_invalid");
        fs::write(
            dir.join("catalog.json"),
            r#"{"items": [{"name": "ore", "stack_size": 0}]}"#,
        )
        .unwrap();

        let result = load_factory_data(&dir);
        assert!(matches!(
            result,
            Err(DataLoadError::Catalog(CatalogError::ZeroStackSize(_)))
        ));

        cleanup(&dir);
    }

    #[test]
    fn load_requires_catalog() {
        let dir = make_test_dir("load_missing");
        fs::write(dir.join("transport.ron"), "()").unwrap();

        assert!(matches!(
            load_factory_data(&dir),
            Err(DataLoadError::MissingRequired { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn error_display_messages() {
        let e = DataLoadError::MissingRequired {
            file: "catalog".to_string(),
            dir: PathBuf::from("/data"),
        };
        assert!(format!("{e}").contains("catalog"));
        assert!(format!("{e}").contains("/data"));

        let e = DataLoadError::UnresolvedRef {
            file: PathBuf::from("catalog.ron"),
            name: "dust".to_string(),
            expected_kind: "item",
        };
        let msg = format!("{e}");
        assert!(msg.contains("dust"));
        assert!(msg.contains("item"));
    }
}
