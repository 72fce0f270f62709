//! Platform definition loading from TOML files.
//!
//! Definitions live in the `platform-definitions/` directory. The same files
//! are compiled in as the built-in set so a binary works without the directory.

use crate::{
    definition::PlatformDefinition,
    error::{PlatformError, Result},
};
use lookout_core::ServiceId;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Definitions bundled into the crate, as `(file name, contents)`.
const BUILTIN_DEFINITIONS: &[(&str, &str)] = &[
    ("github.toml", include_str!("../../../platform-definitions/github.toml")),
    ("twitter.toml", include_str!("../../../platform-definitions/twitter.toml")),
    ("instagram.toml", include_str!("../../../platform-definitions/instagram.toml")),
    ("reddit.toml", include_str!("../../../platform-definitions/reddit.toml")),
    ("youtube.toml", include_str!("../../../platform-definitions/youtube.toml")),
];

/// Parse and validate the built-in platform definitions.
///
/// # Errors
/// Returns error if a bundled file fails to parse or validate.
pub fn builtin_definitions() -> Result<Vec<PlatformDefinition>> {
    BUILTIN_DEFINITIONS
        .iter()
        .map(|(name, contents)| {
            let definition = parse_definition(contents, name)?;
            definition.validate()?;
            Ok(definition)
        })
        .collect()
}

/// Parse a definition from TOML text; `origin` names the source in errors.
pub fn parse_definition(contents: &str, origin: &str) -> Result<PlatformDefinition> {
    toml::from_str(contents).map_err(|e| PlatformError::ParseError {
        path: origin.to_string(),
        source: e,
    })
}

/// Loader for platform definitions from TOML files.
pub struct PlatformLoader {
    /// Base directory containing platform definitions
    definitions_dir: PathBuf,
}

impl PlatformLoader {
    /// Create a new loader with the given definitions directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(definitions_dir: impl Into<PathBuf>) -> Result<Self> {
        let definitions_dir = definitions_dir.into();

        if !definitions_dir.is_dir() {
            return Err(PlatformError::DirectoryNotFound {
                path: definitions_dir.display().to_string(),
            });
        }

        Ok(Self { definitions_dir })
    }

    /// Create a loader using the default definitions directory.
    ///
    /// Looks for `platform-definitions/` relative to the workspace root.
    ///
    /// # Errors
    /// Returns error if the default directory doesn't exist.
    pub fn with_default_dir() -> Result<Self> {
        let mut current_dir = std::env::current_dir()?;

        loop {
            let cargo_toml = current_dir.join("Cargo.toml");
            if let Ok(contents) = std::fs::read_to_string(&cargo_toml) {
                if contents.contains("[workspace]") {
                    return Self::new(current_dir.join("platform-definitions"));
                }
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Self::new(PathBuf::from("platform-definitions"))
    }

    /// Load a single platform definition by ID.
    ///
    /// # Errors
    /// Returns error if the definition file doesn't exist, can't be read, or is invalid.
    pub fn load(&self, platform_id: &ServiceId) -> Result<PlatformDefinition> {
        let filename = format!("{}.toml", platform_id.as_str());
        let path = Self::find_file(&self.definitions_dir, &filename)?.ok_or_else(|| {
            PlatformError::NotFound {
                platform_id: platform_id.to_string(),
            }
        })?;

        let definition = Self::load_from_path(&path)?;
        definition.validate()?;

        debug!(
            platform_id = %platform_id,
            name = %definition.name(),
            "loaded platform definition"
        );

        Ok(definition)
    }

    /// Load all platform definitions from the definitions directory.
    ///
    /// Invalid definitions are logged as warnings and skipped.
    ///
    /// # Errors
    /// Returns error if the directory can't be read.
    pub fn load_all(&self) -> Result<Vec<PlatformDefinition>> {
        let mut definitions = Vec::new();

        Self::walk_and_load_recursive(&self.definitions_dir, &mut definitions)?;

        info!(
            count = definitions.len(),
            dir = %self.definitions_dir.display(),
            "loaded platform definitions"
        );

        Ok(definitions)
    }

    fn walk_and_load_recursive(dir: &Path, definitions: &mut Vec<PlatformDefinition>) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        // Directory order is platform-dependent
        entries.sort();

        for path in entries {
            if path.is_dir() {
                Self::walk_and_load_recursive(&path, definitions)?;
            } else if path.extension().and_then(|s| s.to_str()) == Some("toml") {
                match Self::load_from_path(&path).and_then(|d| d.validate().map(|()| d)) {
                    Ok(definition) => definitions.push(definition),
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "skipping invalid platform definition"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Recursively search for a file by name.
    fn find_file(dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                if let Some(found) = Self::find_file(&path, filename)? {
                    return Ok(Some(found));
                }
            } else if path.file_name().and_then(|s| s.to_str()) == Some(filename) {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    /// Load a platform definition from a specific file path.
    fn load_from_path(path: &Path) -> Result<PlatformDefinition> {
        let contents = std::fs::read_to_string(path).map_err(|e| PlatformError::LoadError {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        parse_definition(&contents, &path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_definition_file(dir: &Path, platform_id: &str) -> PathBuf {
        let file_path = dir.join(format!("{platform_id}.toml"));

        let content = format!(
            r#"
[platform]
id = "{platform_id}"
name = "Test Platform"
url_template = "https://{platform_id}.example.com/{{}}"

[indicators]
found = ["followers"]
not_found = ["no such user"]
"#
        );

        std::fs::write(&file_path, content).expect("write test file");
        file_path
    }

    #[test]
    fn test_builtin_definitions_are_valid() {
        let definitions = builtin_definitions().expect("parse built-in definitions");
        assert_eq!(definitions.len(), 5);

        let ids: Vec<&str> = definitions.iter().map(|d| d.id().as_str()).collect();
        assert!(ids.contains(&"github"));
        assert!(ids.contains(&"youtube"));
    }

    #[test]
    fn test_loader_new_with_nonexistent_dir() {
        let loader = PlatformLoader::new("/nonexistent/path/to/definitions");
        assert!(matches!(loader, Err(PlatformError::DirectoryNotFound { .. })));
    }

    #[test]
    fn test_load_single_platform() {
        let temp_dir = TempDir::new().expect("create temp dir");
        create_test_definition_file(temp_dir.path(), "test-platform");

        let loader = PlatformLoader::new(temp_dir.path()).expect("create loader");
        let platform_id = ServiceId::new("test-platform").expect("valid platform ID");
        let definition = loader.load(&platform_id).expect("load platform definition");

        assert_eq!(definition.id(), &platform_id);
        assert_eq!(definition.name(), "Test Platform");
    }

    #[test]
    fn test_load_nonexistent_platform() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let loader = PlatformLoader::new(temp_dir.path()).expect("create loader");
        let platform_id = ServiceId::new("nonexistent").expect("valid platform ID");

        let result = loader.load(&platform_id);
        assert!(matches!(result, Err(PlatformError::NotFound { .. })));
    }

    #[test]
    fn test_load_all_recurses_and_skips_invalid() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let nested = temp_dir.path().join("social");
        std::fs::create_dir_all(&nested).expect("create nested dir");

        create_test_definition_file(temp_dir.path(), "platform-one");
        create_test_definition_file(&nested, "platform-two");
        std::fs::write(temp_dir.path().join("broken.toml"), "invalid toml [[[")
            .expect("write invalid file");
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").expect("write text file");

        let loader = PlatformLoader::new(temp_dir.path()).expect("create loader");
        let definitions = loader.load_all().expect("load all definitions");

        assert_eq!(definitions.len(), 2);
    }
}
