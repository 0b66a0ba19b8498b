use std::path::PathBuf;
use std::sync::Arc;

use crate::arm::ArmClient;
use crate::auth::{ChainedCredential, TokenCredential};
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::Result;
use crate::version::FileVersionSource;

pub struct AppContext {
    pub project_root: PathBuf,
    pub config: Config,
    pub robot_mode: bool,
    pub output_format: OutputFormat,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let project_root = std::env::current_dir()?;
        let config = Config::load(cli.config.as_deref(), &project_root)?;

        Ok(Self {
            project_root,
            config,
            robot_mode: cli.robot,
            output_format: cli.output_format(),
            verbosity: cli.verbose,
        })
    }

    #[must_use]
    pub const fn wants_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Credential chain in the configured source order.
    pub fn credential(&self) -> Result<Arc<dyn TokenCredential>> {
        let env = |key: &str| std::env::var(key).ok();
        let chain = ChainedCredential::from_config(&self.config.auth, &env)?;
        Ok(Arc::new(chain))
    }

    pub fn arm_client(&self) -> Result<ArmClient> {
        ArmClient::from_config(&self.config, self.credential()?)
    }

    /// Counter file, resolved against the project root when relative.
    #[must_use]
    pub fn version_source(&self) -> FileVersionSource {
        FileVersionSource::new(self.state_path(&self.config.state.version_file))
    }

    /// Capability list file, resolved the same way as the counter file.
    #[must_use]
    pub fn capabilities_path(&self) -> PathBuf {
        self.state_path(&self.config.state.capabilities_file)
    }

    fn state_path(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
