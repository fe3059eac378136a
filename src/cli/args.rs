use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cloudstack_tf::config::ProviderConfig;

pub const DEFAULT_CONFIG_FILE: &str = "main.tf.json";
pub const DEFAULT_STATE_FILE: &str = "cloudstack.tfstate.json";

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub provider: ProviderArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Provider settings; each one falls back to its environment variable.
#[derive(clap::Args, Debug, Clone)]
pub struct ProviderArgs {
    #[arg(long, global = true, env = "CLOUDSTACK_API_URL")]
    pub api_url: Option<String>,

    #[arg(long, global = true, env = "CLOUDSTACK_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, global = true, env = "CLOUDSTACK_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// cloudmonkey style INI file with one section per profile
    #[arg(long, global = true, env = "CLOUDSTACK_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, env = "CLOUDSTACK_PROFILE")]
    pub profile: Option<String>,

    /// Send every request as GET
    #[arg(long, global = true, env = "CLOUDSTACK_HTTP_GET_ONLY")]
    pub http_get_only: bool,

    /// Async job timeout in seconds
    #[arg(long, global = true, env = "CLOUDSTACK_TIMEOUT")]
    pub timeout: Option<u64>,
}

impl ProviderArgs {
    pub fn to_config(&self) -> ProviderConfig {
        ProviderConfig {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            secret_key: self.secret_key.clone(),
            config: self.config.clone(),
            profile: self.profile.clone(),
            http_get_only: self.http_get_only,
            timeout: self.timeout,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the provider, resource and data source schemas
    Schema(SchemaArgs),
    /// Check a configuration against the schemas without calling CloudStack
    Validate(ConfigArgs),
    /// Show the changes apply would make
    Plan(EngineArgs),
    /// Create, update and delete resources to match the configuration
    Apply(EngineArgs),
    /// Re-read every managed object into state
    Refresh(StateArgs),
    /// Bring an existing object under management
    Import(ImportArgs),
    /// Delete every managed object
    Destroy(StateArgs),
    /// Evaluate the data blocks of a configuration
    ReadData(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct SchemaArgs {
    /// Only this resource or data source type
    #[arg(long)]
    pub r#type: Option<String>,

    /// Print JSON instead of a tree
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct StateArgs {
    #[arg(short = 's', long, default_value = DEFAULT_STATE_FILE)]
    pub state: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct EngineArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub state: StateArgs,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Address to import into, e.g. cloudstack_network.web
    pub address: String,

    /// CloudStack id, or <project>/<id> for project scoped resources
    pub id: String,

    #[command(flatten)]
    pub state: StateArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    const PROVIDER_VARS: [&str; 7] = [
        "CLOUDSTACK_API_URL",
        "CLOUDSTACK_API_KEY",
        "CLOUDSTACK_SECRET_KEY",
        "CLOUDSTACK_CONFIG",
        "CLOUDSTACK_PROFILE",
        "CLOUDSTACK_HTTP_GET_ONLY",
        "CLOUDSTACK_TIMEOUT",
    ];

    fn backup_env() -> Vec<(&'static str, Option<String>)> {
        PROVIDER_VARS
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect()
    }

    fn restore_env(backup: Vec<(&'static str, Option<String>)>) {
        unsafe {
            for (name, value) in backup {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_plan_defaults() {
        let cli = Cli::parse_from(["cloudstack-tf", "plan"]);

        if let Command::Plan(args) = cli.command {
            assert_eq!(args.config.config_file, PathBuf::from(DEFAULT_CONFIG_FILE));
            assert_eq!(args.state.state, PathBuf::from(DEFAULT_STATE_FILE));
        } else {
            panic!("Expected Plan command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_import_args() {
        let cli = Cli::parse_from([
            "cloudstack-tf",
            "import",
            "cloudstack_network.web",
            "devops/5d7e1b5c",
            "--state=prod.json",
        ]);

        if let Command::Import(args) = cli.command {
            assert_eq!(args.address, "cloudstack_network.web");
            assert_eq!(args.id, "devops/5d7e1b5c");
            assert_eq!(args.state.state, PathBuf::from("prod.json"));
        } else {
            panic!("Expected Import command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_read_data_command_name() {
        let cli = Cli::parse_from(["cloudstack-tf", "read-data", "-c", "zones.tf.json"]);

        if let Command::ReadData(args) = cli.command {
            assert_eq!(args.config_file, PathBuf::from("zones.tf.json"));
        } else {
            panic!("Expected ReadData command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_provider_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "cloudstack-tf",
            "refresh",
            "--api-url=https://cloud.example.com/client/api",
            "--http-get-only",
            "--timeout=300",
        ]);

        assert_eq!(
            cli.provider.api_url.as_deref(),
            Some("https://cloud.example.com/client/api")
        );
        assert!(cli.provider.http_get_only);
        assert_eq!(cli.provider.timeout, Some(300));
    }

    #[test]
    #[serial]
    fn test_no_provider_settings() {
        let backup = backup_env();
        unsafe {
            for name in PROVIDER_VARS {
                std::env::remove_var(name);
            }
        }

        let cli = Cli::parse_from(["cloudstack-tf", "schema"]);

        restore_env(backup);

        assert!(cli.provider.api_url.is_none());
        assert!(cli.provider.api_key.is_none());
        assert!(cli.provider.config.is_none());
        assert!(!cli.provider.http_get_only);
    }

    #[test]
    #[serial]
    fn test_keys_from_env_var_fallback() {
        let backup = backup_env();
        unsafe {
            std::env::set_var("CLOUDSTACK_API_KEY", "env_api_key");
            std::env::set_var("CLOUDSTACK_SECRET_KEY", "env_secret");
            std::env::set_var("CLOUDSTACK_HTTP_GET_ONLY", "true");
        }

        let cli = Cli::parse_from(["cloudstack-tf", "refresh"]);

        restore_env(backup);

        let config = cli.provider.to_config();
        assert_eq!(config.api_key.as_deref(), Some("env_api_key"));
        assert_eq!(config.secret_key.as_deref(), Some("env_secret"));
        assert!(config.http_get_only);
    }

    #[test]
    #[serial]
    fn test_cli_flag_takes_precedence_over_env() {
        let backup = backup_env();
        unsafe {
            std::env::set_var("CLOUDSTACK_PROFILE", "env_profile");
        }

        let cli = Cli::parse_from(["cloudstack-tf", "--profile=lab", "destroy"]);

        restore_env(backup);

        assert_eq!(cli.provider.profile.as_deref(), Some("lab"));
    }
}
