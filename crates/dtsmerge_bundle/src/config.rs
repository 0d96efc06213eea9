use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{debug, info};
use std::{env, path::PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "build")]
#[command(about = "Bundle TypeScript declaration files")]
pub struct Config {
    /// Declaration entry files (defaults to the package.json types/exports entries)
    pub inputs: Vec<PathBuf>,

    /// Package root directory (defaults to the current directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Package to leave as an external import (repeatable)
    #[arg(long = "external", short = 'e')]
    pub external: Vec<String>,

    /// Print the build report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Config {
    /// Initialize the config by resolving the package root directory
    pub fn initialize(&mut self) -> Result<()> {
        let cwd = match self.cwd.take() {
            Some(dir) => {
                debug!("Using provided package root: {:?}", dir);
                dir
            }
            None => env::current_dir().context("Failed to read the current directory")?,
        };
        let cwd = cwd
            .canonicalize()
            .with_context(|| format!("Package root {} does not exist", cwd.display()))?;
        info!("Using package root: {}", cwd.display());

        self.cwd = Some(cwd);
        Ok(())
    }

    /// Get the package root, returning an error if not initialized
    pub fn cwd(&self) -> Result<&PathBuf> {
        self.cwd.as_ref().ok_or_else(|| anyhow!("Config not initialized - call initialize() first"))
    }

    /// Explicit inputs made absolute against the package root
    pub fn input_paths(&self) -> Result<Vec<PathBuf>> {
        let cwd = self.cwd()?;
        Ok(self.inputs.iter().map(|input| cwd.join(input)).collect())
    }
}
