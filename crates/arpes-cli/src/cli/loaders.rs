//! Spectrum file formats, dispatched by file-name pattern.

use anyhow::Context;
use arpes_core::{ArpesError, ConversionSettings, LabeledArray, LabeledArrayDocument};
use globset::{Glob, GlobMatcher};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// One on-disk spectrum format.
pub(super) trait SpectrumLoader {
    fn name(&self) -> &'static str;
    fn load(&self, path: &Path) -> Result<LabeledArray, LoadError>;
}

/// JSON `LabeledArrayDocument`: named coordinates, row-major values with
/// `null` for missing samples, and free-form attributes.
pub(super) struct JsonDocumentLoader;

impl SpectrumLoader for JsonDocumentLoader {
    fn name(&self) -> &'static str {
        "json-document"
    }

    fn load(&self, path: &Path) -> Result<LabeledArray, LoadError> {
        let document: LabeledArrayDocument = read_json(path)?;
        LabeledArray::from_document(document).map_err(|source| LoadError::Spectrum {
            path: path.to_path_buf(),
            source,
        })
    }
}

struct RegisteredLoader {
    pattern: String,
    matcher: GlobMatcher,
    loader: Box<dyn SpectrumLoader>,
}

/// Loaders in registration order; the first pattern matching a file name wins.
pub(super) struct LoaderRegistry {
    loaders: Vec<RegisteredLoader>,
}

impl LoaderRegistry {
    pub(super) fn with_default_loaders() -> Result<Self, LoadError> {
        let mut registry = Self { loaders: Vec::new() };
        registry.register("*.json", Box::new(JsonDocumentLoader))?;
        Ok(registry)
    }

    pub(super) fn register(&mut self, pattern: &str, loader: Box<dyn SpectrumLoader>) -> Result<(), LoadError> {
        let matcher = Glob::new(pattern)
            .map_err(|source| LoadError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();
        self.loaders.push(RegisteredLoader {
            pattern: pattern.to_string(),
            matcher,
            loader,
        });
        Ok(())
    }

    pub(super) fn loader_for(&self, path: &Path) -> Result<&dyn SpectrumLoader, LoadError> {
        let file_name = path.file_name().map(Path::new).unwrap_or(path);
        self.loaders
            .iter()
            .find(|registered| registered.matcher.is_match(file_name))
            .map(|registered| {
                tracing::debug!(
                    path = %path.display(),
                    pattern = %registered.pattern,
                    loader = registered.loader.name(),
                    "selected spectrum loader"
                );
                registered.loader.as_ref()
            })
            .ok_or_else(|| LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                patterns: self
                    .loaders
                    .iter()
                    .map(|registered| registered.pattern.clone())
                    .collect(),
            })
    }

    pub(super) fn load(&self, path: &Path) -> Result<LabeledArray, LoadError> {
        self.loader_for(path)?.load(path)
    }
}

pub(super) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let source = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(super) fn read_settings(path: &Path) -> Result<ConversionSettings, LoadError> {
    let source = fs::read_to_string(path).map_err(|source| LoadError::SettingsRead {
        path: path.to_path_buf(),
        source,
    })?;
    ConversionSettings::from_json_str(&source).map_err(|source| LoadError::Settings {
        path: path.to_path_buf(),
        source,
    })
}

pub(super) fn write_document(path: &Path, array: &LabeledArray) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    let rendered = serde_json::to_string_pretty(&array.to_document())
        .context("failed to serialize output document")?;
    fs::write(path, format!("{rendered}\n"))
        .with_context(|| format!("failed to write output '{}'", path.display()))
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read '{}': {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse '{}': {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("'{}' is not a valid spectrum: {source}", path.display())]
    Spectrum { path: PathBuf, source: ArpesError },
    #[error("no loader handles '{}' (known patterns: {patterns:?})", path.display())]
    UnsupportedFormat { path: PathBuf, patterns: Vec<String> },
    #[error("failed to read settings '{}': {source}", path.display())]
    SettingsRead { path: PathBuf, source: std::io::Error },
    #[error("invalid settings '{}': {source}", path.display())]
    Settings { path: PathBuf, source: ArpesError },
    #[error("invalid loader pattern '{pattern}': {source}")]
    InvalidPattern { pattern: String, source: globset::Error },
}

impl LoadError {
    pub(super) fn as_arpes_error(&self) -> ArpesError {
        match self {
            Self::Read { .. } => ArpesError::io("IO.INPUT_READ", self.to_string()),
            Self::Parse { .. } => ArpesError::invalid_input("INPUT.DOCUMENT_PARSE", self.to_string()),
            Self::Spectrum { source, .. } | Self::Settings { source, .. } => source.clone(),
            Self::SettingsRead { .. } => ArpesError::io("IO.SETTINGS_READ", self.to_string()),
            Self::UnsupportedFormat { .. } => ArpesError::invalid_input("INPUT.FORMAT", self.to_string()),
            Self::InvalidPattern { .. } => ArpesError::io("IO.LOADER_PATTERN", self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LabeledArray, LoadError, LoaderRegistry, SpectrumLoader, read_settings};
    use arpes_core::ArpesErrorKind;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Rejecting;

    impl SpectrumLoader for Rejecting {
        fn name(&self) -> &'static str {
            "rejecting"
        }

        fn load(&self, path: &Path) -> Result<LabeledArray, LoadError> {
            Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                patterns: Vec::new(),
            })
        }
    }

    #[test]
    fn first_matching_pattern_wins() {
        let mut registry = LoaderRegistry::with_default_loaders().expect("registry");
        registry.register("*.arpes.json", Box::new(Rejecting)).expect("register");

        let loader = registry.loader_for(Path::new("/data/scan.arpes.json")).expect("loader");
        assert_eq!(loader.name(), "json-document");
    }

    #[test]
    fn unknown_extensions_are_reported() {
        let registry = LoaderRegistry::with_default_loaders().expect("registry");
        let error = match registry.loader_for(Path::new("scan.pxt")) {
            Ok(_) => panic!("pxt has no loader"),
            Err(error) => error,
        };
        assert_eq!(error.as_arpes_error().placeholder(), "INPUT.FORMAT");
    }

    #[test]
    fn settings_errors_keep_their_own_codes() {
        let temp = TempDir::new().expect("tempdir");
        let missing = temp.path().join("missing.json");
        let error = read_settings(&missing).expect_err("missing settings file");
        assert!(matches!(error, LoadError::SettingsRead { .. }));
        assert_eq!(error.as_arpes_error().placeholder(), "IO.SETTINGS_READ");

        let invalid = temp.path().join("settings.json");
        fs::write(&invalid, r#"{ "solver": { "tolerance": 0.0 } }"#).expect("write settings");
        let error = read_settings(&invalid).expect_err("zero solver tolerance");
        assert_eq!(error.as_arpes_error().kind(), ArpesErrorKind::InvalidInput);

        fs::write(&invalid, r#"{ "defaultInnerPotential": 12.5 }"#).expect("write settings");
        let settings = read_settings(&invalid).expect("partial settings");
        assert_eq!(settings.default_inner_potential, 12.5);
        assert_eq!(settings.default_work_function, 4.3);
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        let mut registry = LoaderRegistry::with_default_loaders().expect("registry");
        let error = registry
            .register("*.{json", Box::new(Rejecting))
            .expect_err("unclosed alternate");
        assert!(matches!(error, LoadError::InvalidPattern { .. }));
    }
}
