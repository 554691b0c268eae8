use std::path::Path;

use ::config as config_rs;
use anyhow::{Context, Result};
use config_rs::{ConfigBuilder, builder::DefaultState};
use serde::de::DeserializeOwned;

/// Loads a config struct from `APP_*` environment variables, e.g.
/// `APP_AUTH__JWT_SECRET` for `auth.jwt_secret`.
pub trait EnvConfig: Sized + DeserializeOwned {
    const PREFIX: &'static str = "APP";
    const SEPARATOR: &'static str = "__";
    /// Names an optional TOML/YAML/JSON file read before the environment.
    const FILE_VAR: &'static str = "APP_CONFIG_FILE";

    fn load_dotenv() {
        // crate root first, then the working directory
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let _ = dotenvy::from_filename(manifest_dir.join(".env")).or_else(|_| dotenvy::dotenv());
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn sources() -> ConfigBuilder<DefaultState> {
        let mut builder = config_rs::Config::builder();
        if let Ok(path) = std::env::var(Self::FILE_VAR) {
            builder = builder.add_source(config_rs::File::with_name(&path).required(false));
        }
        builder.add_source(
            config_rs::Environment::with_prefix(Self::PREFIX)
                .prefix_separator("_")
                .separator(Self::SEPARATOR)
                .try_parsing(true),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings = builder
            .build()
            .context("failed to read config sources")?;

        let cfg = settings
            .try_deserialize::<Self>()
            .context("failed to deserialize config")?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn from_env() -> Result<Self> {
        Self::load_dotenv();
        Self::from_builder(Self::sources())
    }
}
