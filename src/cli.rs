use std::path::{Path, PathBuf};

use lazy_singleton::config::{Config, ProbeConfig};
use lazy_singleton::probe::Report;
use lazy_singleton::Variant;

#[derive(Copy, Clone, PartialEq, Eq, clap::ValueEnum, Default)]
pub enum Format {
    #[default]
    Long,
    Json,
}

impl Format {
    pub fn into_error_hook(self) -> miette::ErrorHook {
        match self {
            Self::Long => Box::new(|_| Box::new(miette::GraphicalReportHandler::new())),
            Self::Json => Box::new(|_| Box::new(miette::JSONReportHandler::new())),
        }
    }

    pub fn render(self, report: &Report) -> anyhow::Result<String> {
        match self {
            Self::Long => Ok(report.to_string()),
            Self::Json => Ok(serde_json::to_string(report)?),
        }
    }
}

#[derive(clap::Parser)]
#[command(about, version)]
pub(crate) struct Args {
    /// Variants to probe (all of them by default)
    #[arg(long = "variant", value_enum)]
    variants: Vec<Variant>,

    /// Number of threads racing on each accessor
    #[arg(long)]
    threads: Option<usize>,

    /// Time spent inside the constructor during the race, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Only check that consecutive accesses return the same instance
    #[arg(long)]
    no_contention: bool,

    /// Custom config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore implicit configuration files
    #[arg(long)]
    isolated: bool,

    /// Render style for messages
    #[arg(long, value_enum, ignore_case = true, default_value("long"))]
    format: Format,
}

impl Args {
    /// Layers defaults, the config file and the command line
    pub fn to_config(&self, cwd: &Path) -> anyhow::Result<Config> {
        let mut config = Config::from_defaults();

        if let Some(path) = &self.config {
            if let Some(custom) = Config::from_file(path)? {
                config.update(&custom);
            }
        } else if !self.isolated {
            if let Some(discovered) = Config::from_dir(cwd)? {
                config.update(&discovered);
            }
        }

        config.update(&self.to_overrides());
        config.validate()?;

        Ok(config)
    }

    fn to_overrides(&self) -> Config {
        Config {
            variants: (!self.variants.is_empty()).then(|| self.variants.clone()),
            probe: ProbeConfig {
                threads: self.threads,
                construction_delay_ms: self.delay_ms,
                contention: self.no_contention.then_some(false),
            },
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }
}
