//! Configuration loading and management.

use std::path::{Path, PathBuf};

use cm_core::MergeConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::cli::OverrideArgs;

/// Application configuration.
///
/// The merge settings sit at the top level of the config file:
///
/// ```toml
/// input_collections = ["PandoraPFOs", "BCalPFOs"]
/// input_collection_ids = [1, 2]
/// output_collection = "AllPFOs"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Which collections to merge and the output name.
    #[serde(flatten)]
    pub merge: MergeConfig,

    /// Process events on a thread pool instead of one by one.
    #[serde(default)]
    pub parallel: bool,
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (CM_*)
        figment = figment.merge(Env::prefixed("CM_"));

        figment.extract()
    }

    /// Applies command-line overrides on top of the loaded values.
    ///
    /// Passing `--collection` replaces both the input list and the ID list, so
    /// stale IDs from a config file never pair with a new set of names.
    pub fn apply_overrides(&mut self, overrides: &OverrideArgs) {
        if !overrides.collections.is_empty() {
            self.merge.input_collections.clone_from(&overrides.collections);
            self.merge.input_collection_ids.clone_from(&overrides.ids);
        } else if !overrides.ids.is_empty() {
            self.merge.input_collection_ids.clone_from(&overrides.ids);
        }
        if let Some(name) = &overrides.output_collection {
            self.merge.output_collection.clone_from(name);
        }
        self.parallel |= overrides.parallel;
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

/// Returns the platform-specific config directory for cm.
///
/// On Linux: `~/.config/cm`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cm"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use figment::Jail;

    #[test]
    fn test_dirs_config_path_ends_with_cm() {
        let path = dirs_config_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "cm");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.merge, MergeConfig::default());
        assert_eq!(config.merge.output_collection, "MergedCollection");
        assert!(!config.parallel);
    }

    #[test]
    fn test_load_from_file_and_env() {
        Jail::expect_with(|jail| {
            jail.set_env("HOME", jail.directory().display().to_string());
            jail.set_env(
                "XDG_CONFIG_HOME",
                jail.directory().join("xdg").display().to_string(),
            );
            jail.create_file(
                "merge.toml",
                r#"
                input_collections = ["A", "B"]
                input_collection_ids = [1, 2]
                output_collection = "AB"
                "#,
            )?;
            jail.set_env("CM_PARALLEL", "true");

            let config = Config::load_from(Some(Path::new("merge.toml")))?;
            assert_eq!(
                config.merge,
                MergeConfig::new(["A", "B"]).with_ids([1, 2]).with_output("AB")
            );
            assert!(config.parallel);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_output_name() {
        Jail::expect_with(|jail| {
            jail.set_env("HOME", jail.directory().display().to_string());
            jail.set_env(
                "XDG_CONFIG_HOME",
                jail.directory().join("xdg").display().to_string(),
            );
            jail.set_env("CM_OUTPUT_COLLECTION", "FromEnv");

            let config = Config::load_from(None)?;
            assert_eq!(config.merge.output_collection, "FromEnv");
            assert!(config.merge.input_collections.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_overrides_replace_inputs_and_ids() {
        let mut config = Config {
            merge: MergeConfig::new(["A", "B"]).with_ids([1, 2]),
            parallel: false,
        };
        config.apply_overrides(&OverrideArgs {
            collections: vec!["C".to_string()],
            ids: Vec::new(),
            output_collection: Some("Out".to_string()),
            parallel: true,
        });

        assert_eq!(config.merge, MergeConfig::new(["C"]).with_output("Out"));
        assert!(config.parallel);
    }

    #[test]
    fn test_overrides_ids_only() {
        let mut config = Config {
            merge: MergeConfig::new(["A", "B"]),
            parallel: false,
        };
        config.apply_overrides(&OverrideArgs {
            ids: vec![5, -6],
            ..OverrideArgs::default()
        });

        assert_eq!(config.merge.input_collections, ["A", "B"]);
        assert_eq!(config.merge.input_collection_ids, [5, -6]);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let original = Config {
            merge: MergeConfig::new(["A"]).with_ids([3]).with_output("X"),
            parallel: true,
        };
        let mut config = original.clone();
        config.apply_overrides(&OverrideArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_to_toml() {
        let config = Config {
            merge: MergeConfig::new(["Tracks", "Clusters"]).with_output("All"),
            parallel: false,
        };
        insta::assert_snapshot!(config.to_toml().unwrap(), @r#"
        input_collections = ["Tracks", "Clusters"]
        input_collection_ids = []
        output_collection = "All"
        parallel = false
        "#);
    }
}
