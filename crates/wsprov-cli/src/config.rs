use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use ipnet::Ipv4Net;
use wsprov::{PoolConfig, ProvisionConfig, Token};

/// Runtime configuration for the `wsprov-cli` binary.
///
/// Global settings describe the address universe and where workspace state
/// is kept. They are parsed from CLI arguments or environment variables (a
/// `.env` file is honored), and must stay the same across invocations that
/// share a state file: persisted addresses outside the configured ranges are
/// rejected on load.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "wsprov-cli",
    version,
    about = "Provision workspace subdomains and IPv4 addresses"
)]
pub struct CliArgs {
    /// Comma-separated IPv4 ranges the address pool allocates from.
    ///
    /// Ranges must not overlap. Addresses are handed out round-robin across
    /// ranges, in the order given.
    ///
    /// Environment variable: `POOL_RANGES`
    #[arg(
        long,
        env = "POOL_RANGES",
        value_delimiter = ',',
        default_value = "10.0.0.0/16,172.16.0.0/16"
    )]
    pub ranges: Vec<Ipv4Net>,

    /// Samples drawn per subdomain before giving up on finding an unused one.
    ///
    /// Environment variable: `MAX_TOKEN_ATTEMPTS`
    #[arg(long, env = "MAX_TOKEN_ATTEMPTS", default_value_t = wsprov::DEFAULT_MAX_ATTEMPTS)]
    pub max_token_attempts: usize,

    /// JSON file holding every live workspace.
    ///
    /// Created on first write.
    ///
    /// Environment variable: `STATE_FILE`
    #[arg(long, env = "STATE_FILE", default_value = "workspaces.json")]
    pub state_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Provision a new workspace and print its record.
    Create {
        /// Display name of the workspace. Names need not be unique.
        name: String,

        /// Number of addresses to allocate for the workspace.
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Delete a workspace and return its addresses to the pool.
    Delete {
        /// Subdomain token of the workspace.
        subdomain: Token,
    },
    /// Print every live workspace.
    List,
    /// Print pool and registry occupancy.
    Stats,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub provision: ProvisionConfig,
    pub state_file: PathBuf,
    pub command: Command,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.max_token_attempts == 0 {
            bail!("MAX_TOKEN_ATTEMPTS must be greater than 0");
        }

        let pool = PoolConfig::new(args.ranges).context("invalid POOL_RANGES")?;

        match args.command {
            Command::Create { count: 0, .. } => bail!("--count must be greater than 0"),
            Command::Create { count, .. } if count > pool.size() => bail!(
                "--count ({}) exceeds the number of addresses in the pool (max = {})",
                count,
                pool.size()
            ),
            _ => {}
        }

        Ok(Self {
            provision: ProvisionConfig {
                pool,
                max_token_attempts: args.max_token_attempts,
            },
            state_file: args.state_file,
            command: args.command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<CliConfig> {
        let argv = std::iter::once("wsprov-cli").chain(args.iter().copied());
        let args = CliArgs::try_parse_from(argv)?;
        CliConfig::try_from(args)
    }

    #[test]
    fn explicit_flags_are_applied() {
        let config = parse(&[
            "--ranges",
            "192.168.0.0/24,192.168.1.0/24",
            "--max-token-attempts",
            "8",
            "--state-file",
            "/tmp/state.json",
            "create",
            "demo",
            "--count",
            "3",
        ])
        .unwrap();

        assert_eq!(
            config.provision.pool.ranges(),
            &[
                "192.168.0.0/24".parse::<Ipv4Net>().unwrap(),
                "192.168.1.0/24".parse::<Ipv4Net>().unwrap(),
            ]
        );
        assert_eq!(config.provision.max_token_attempts, 8);
        assert_eq!(config.state_file, PathBuf::from("/tmp/state.json"));
        assert_eq!(
            config.command,
            Command::Create {
                name: "demo".to_string(),
                count: 3,
            }
        );
    }

    #[test]
    fn delete_parses_subdomain_token() {
        let config = parse(&["--ranges", "10.0.0.0/16", "delete", "abcd1234"]).unwrap();
        assert_eq!(
            config.command,
            Command::Delete {
                subdomain: "abcd1234".parse().unwrap(),
            }
        );
        assert!(parse(&["delete", "ABCD1234"]).is_err());
        assert!(parse(&["delete", "short"]).is_err());
    }

    #[test]
    fn zero_token_attempts_is_rejected() {
        let err = parse(&["--max-token-attempts", "0", "list"]).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKEN_ATTEMPTS"));
    }

    #[test]
    fn zero_count_is_rejected() {
        let err = parse(&["create", "demo", "--count", "0"]).unwrap_err();
        assert!(err.to_string().contains("--count"));
    }

    #[test]
    fn count_larger_than_pool_is_rejected() {
        let err = parse(&["--ranges", "10.1.0.0/30", "create", "demo", "--count", "5"])
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn overlapping_ranges_are_rejected() {
        let err = parse(&["--ranges", "10.0.0.0/8,10.1.0.0/16", "stats"]).unwrap_err();
        assert!(err.to_string().contains("POOL_RANGES"));
    }

    #[test]
    fn command_is_named_after_binary() {
        use clap::CommandFactory;
        assert_eq!(CliArgs::command().get_name(), "wsprov-cli");
    }

    #[test]
    fn malformed_range_fails_to_parse() {
        assert!(parse(&["--ranges", "10.0.0.0/33", "list"]).is_err());
    }
}
