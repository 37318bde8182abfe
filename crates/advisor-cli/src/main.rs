use std::path::PathBuf;

use advisor_seed::{SeedConfig, SeedPipeline};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Load an Azure inventory and advisor export into a report snapshot.
#[derive(Debug, Parser)]
#[command(name = "advisor-seed")]
#[command(about = "Build the Azure Advisor report database from CSV exports")]
struct Cli {
    /// Client display name stored with the report.
    client_name: String,

    /// Directory holding the exports [env: ADVISOR_INPUT_DIR, default: .]
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Snapshot to publish [env: ADVISOR_DATABASE, default: report.db]
    #[arg(long)]
    database: Option<PathBuf>,

    /// Keep recommendations that cannot be tied to a resource.
    #[arg(long)]
    keep_unresolved: bool,
}

impl Cli {
    fn config(&self) -> SeedConfig {
        let mut config = SeedConfig::from_env();
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(database) = &self.database {
            config.database_path = database.clone();
        }
        config.keep_unresolved |= self.keep_unresolved;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    let summary = SeedPipeline::new(config.clone())
        .run(&cli.client_name)
        .await
        .with_context(|| format!("loading exports from {}", config.input_dir.display()))?;

    println!("{summary}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_environment_defaults() {
        let cli = Cli::parse_from([
            "advisor-seed",
            "Contoso Ltd",
            "--input-dir",
            "exports",
            "--database",
            "out/report.db",
            "--keep-unresolved",
        ]);
        let config = cli.config();
        assert_eq!(cli.client_name, "Contoso Ltd");
        assert_eq!(config.input_dir, PathBuf::from("exports"));
        assert_eq!(config.database_path, PathBuf::from("out/report.db"));
        assert!(config.keep_unresolved);
    }

    #[test]
    fn client_name_is_required() {
        assert!(Cli::try_parse_from(["advisor-seed"]).is_err());
    }
}
