//! Config parsers for the probe.
//!
//! Settings are layered: built-in defaults, then a config file, then the
//! command line, each layer overriding only the fields it sets.
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::probe::Settings;
use crate::Variant;

pub const SUPPORTED_FILE_NAMES: &[&str] =
    &["lazy-singleton.toml", ".lazy-singleton.toml", "Cargo.toml"];

const DEFAULT_THREADS: usize = 8;
/// Upper bound on racing threads, kept well below OS thread limits
pub const MAX_THREADS: usize = 1024;
const DEFAULT_CONSTRUCTION_DELAY_MS: u64 = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Variants to probe, all of them if unset
    pub variants: Option<Vec<Variant>>,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct CargoTomlConfig {
    pub package: CargoTomlPackage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct CargoTomlPackage {
    pub metadata: CargoTomlMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct CargoTomlMetadata {
    pub lazy_singleton: Option<Config>,
}

impl Config {
    /// Loads the first supported config file found in `cwd`
    pub fn from_dir(cwd: &Path) -> anyhow::Result<Option<Self>> {
        for file in find_project_files(cwd, SUPPORTED_FILE_NAMES) {
            if let Some(config) = Self::from_file(&file)? {
                return Ok(Some(config));
            }
        }

        Ok(None)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Option<Self>> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config at `{}`", path.display()))?;

        let config = if path.file_name() == Some(OsStr::new("Cargo.toml")) {
            let manifest = toml::from_str::<CargoTomlConfig>(&s)
                .with_context(|| format!("could not parse config at `{}`", path.display()))?;

            let config = manifest.package.metadata.lazy_singleton;
            if let Some(config) = &config {
                config
                    .validate()
                    .with_context(|| format!("invalid config at `{}`", path.display()))?;
            }

            config
        } else {
            Self::from_toml(&s)
                .map(Some)
                .with_context(|| format!("could not parse config at `{}`", path.display()))?
        };

        if config.is_some() {
            log::debug!("loaded config from `{}`", path.display());
        }

        Ok(config)
    }

    pub fn from_toml(data: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(data)?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_defaults() -> Self {
        Self {
            variants: Some(Variant::ALL.to_vec()),
            probe: ProbeConfig::from_defaults(),
        }
    }

    pub fn update(&mut self, source: &Self) {
        if let Some(source) = &source.variants {
            self.variants = Some(source.clone());
        }
        self.probe.update(&source.probe);
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.probe.threads == Some(0) {
            anyhow::bail!("`probe.threads` must be at least 1");
        }
        if let Some(threads) = self.probe.threads.filter(|&threads| threads > MAX_THREADS) {
            anyhow::bail!("`probe.threads` must be at most {MAX_THREADS}, got {threads}");
        }
        if self.variants.as_ref().is_some_and(Vec::is_empty) {
            anyhow::bail!("`variants` must name at least one variant");
        }

        Ok(())
    }

    pub fn variants(&self) -> &[Variant] {
        self.variants.as_deref().unwrap_or(Variant::ALL)
    }

    pub fn to_settings(&self) -> Settings {
        Settings {
            threads: self.probe.threads(),
            construction_delay: self.probe.construction_delay(),
            contention: self.probe.contention(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct ProbeConfig {
    /// Number of threads racing on a fresh accessor.
    pub threads: Option<usize>,

    /// Time spent inside the constructor during the race, in milliseconds.
    pub construction_delay_ms: Option<u64>,

    /// Race threads on each accessor.
    pub contention: Option<bool>,
}

impl ProbeConfig {
    pub fn from_defaults() -> Self {
        let empty = Self::default();
        Self {
            threads: Some(empty.threads()),
            construction_delay_ms: Some(DEFAULT_CONSTRUCTION_DELAY_MS),
            contention: Some(empty.contention()),
        }
    }

    pub fn update(&mut self, source: &Self) {
        if let Some(source) = source.threads {
            self.threads = Some(source);
        }
        if let Some(source) = source.construction_delay_ms {
            self.construction_delay_ms = Some(source);
        }
        if let Some(source) = source.contention {
            self.contention = Some(source);
        }
    }

    pub fn threads(&self) -> usize {
        self.threads.unwrap_or(DEFAULT_THREADS)
    }

    pub fn construction_delay(&self) -> Duration {
        Duration::from_millis(
            self.construction_delay_ms
                .unwrap_or(DEFAULT_CONSTRUCTION_DELAY_MS),
        )
    }

    pub fn contention(&self) -> bool {
        self.contention.unwrap_or(true)
    }
}

fn find_project_files<'a>(
    dir: &'a Path,
    names: &'a [&'a str],
) -> impl Iterator<Item = PathBuf> + 'a {
    names
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::Variant;

    use super::*;

    #[test]
    fn test_update_from_nothing() {
        let null = Config::default();
        let defaulted = Config::from_defaults();

        let mut actual = defaulted.clone();
        actual.update(&null);

        assert_eq!(actual, defaulted);
    }

    #[test]
    fn test_update_from_defaults() {
        let null = Config::default();
        let defaulted = Config::from_defaults();

        let mut actual = null;
        actual.update(&defaulted);

        assert_eq!(actual, defaulted);
    }

    #[test]
    fn parse_probe_section() {
        let input = r#"variants = ["checked", "lazy-lock"]

[probe]
threads = 3
construction-delay-ms = 1
"#;
        let actual = Config::from_toml(input).unwrap();
        assert_eq!(actual.variants(), [Variant::Checked, Variant::LazyLock]);

        let settings = actual.to_settings();
        assert_eq!(settings.threads, 3);
        assert_eq!(settings.construction_delay, Duration::from_millis(1));
        assert!(settings.contention);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(Config::from_toml("[probe]\nthreads = 0\n").is_err());
        assert!(Config::from_toml("[probe]\nthreads = 1024\n").is_ok());
        let err = Config::from_toml("[probe]\nthreads = 1000000\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "`probe.threads` must be at most 1024, got 1000000"
        );
        assert!(Config::from_toml("variants = []\n").is_err());
        assert!(Config::from_toml("variants = [\"double\"]\n").is_err());
        assert!(Config::from_toml("[probe]\nunknown = true\n").is_err());
    }

    #[test]
    fn later_layers_win() {
        let mut config = Config::from_defaults();
        config.update(&Config::from_toml("[probe]\ncontention = false\n").unwrap());
        config.update(&Config {
            variants: Some(vec![Variant::Eager]),
            ..Config::default()
        });

        assert_eq!(config.variants(), [Variant::Eager]);
        assert!(!config.to_settings().contention);
        assert_eq!(config.to_settings().threads, 8);
    }

    #[test]
    fn discovers_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::from_dir(dir.path()).unwrap(), None);

        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"demo\"\n\n[package.metadata.lazy-singleton.probe]\nthreads = 2\n",
        )
        .unwrap();
        let from_manifest = Config::from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(from_manifest.probe.threads, Some(2));

        std::fs::write(
            dir.path().join(".lazy-singleton.toml"),
            "[probe]\nthreads = 5\n",
        )
        .unwrap();
        let from_dotfile = Config::from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(from_dotfile.probe.threads, Some(5));
    }

    #[test]
    fn manifest_without_metadata_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("Cargo.toml");
        std::fs::write(&manifest, "[package]\nname = \"demo\"\n").unwrap();

        assert_eq!(Config::from_file(&manifest).unwrap(), None);
    }
}
