//! Build configuration loading.

use std::path::Path;

use tribal_risk_geography_models::config::BuildConfig;

use crate::GeoError;

/// Loads a [`BuildConfig`] from a TOML file.
///
/// A missing file yields the defaults (logged), so a fresh checkout runs
/// against the conventional `data/` layout without any configuration.
///
/// # Errors
///
/// Returns [`GeoError`] if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<BuildConfig, GeoError> {
    if !path.exists() {
        log::info!(
            "No config at {}, using built-in defaults",
            path.display()
        );
        return Ok(BuildConfig::default());
    }
    let contents = std::fs::read_to_string(path)?;
    let config: BuildConfig = toml::from_str(&contents)?;
    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tribal_risk.toml");
        std::fs::write(&path, "[crosswalk]\nmin_overlap = 0.05\n").unwrap();
        let config = load_config(&path).unwrap();
        assert!((config.crosswalk.min_overlap - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[crosswalk\n").unwrap();
        assert!(matches!(load_config(&path), Err(GeoError::Toml(_))));
    }
}
