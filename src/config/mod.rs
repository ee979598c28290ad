pub mod env;
pub mod toml_config;

pub use toml_config::SyncConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "deal-board-sync")]
#[command(about = "Creates project boards for CRM deals entering kickoff")]
pub struct CliConfig {
    /// TOML configuration file; without it, configuration comes from the environment
    #[arg(long)]
    pub config: Option<String>,

    /// Run a single sync, print the result as JSON and exit
    #[arg(long)]
    pub once: bool,

    /// Override the HTTP bind address
    #[arg(long)]
    pub bind: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn load(&self) -> crate::utils::error::Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::from_file(path)?,
            None => SyncConfig::from_env()?,
        };
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        Ok(config)
    }
}
