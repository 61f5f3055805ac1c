//! dhcp server configs

pub mod cli {
    //! Process options, read from argv with environment fallback

    /// dhcpv6 link-scoped multicast group the server listens in
    pub static ALL_DHCP_RELAY_AGENTS_AND_SERVERS: Ipv6Addr =
        Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 1, 2);
    /// Default dhcpv6 port
    pub const DEFAULT_V6_PORT: u16 = v6::SERVER_PORT;
    /// Default dhcpv4 port
    pub const DEFAULT_V4_PORT: u16 = 67;
    /// where the YAML server config lives unless told otherwise
    pub static DEFAULT_CONFIG_PATH: &str = "/var/lib/vesta/config.yaml";
    /// instance name used when none is given
    pub const DEFAULT_VESTA_ID: &str = "vesta_id";
    /// log filter applied when neither --vesta-log nor VESTA_LOG is set
    pub const DEFAULT_VESTA_LOG: &str = "info";

    use std::{net::Ipv6Addr, path::PathBuf};

    pub use clap::Parser;
    use vesta_proto::v6;

    #[derive(Parser, Debug, Clone, PartialEq, Eq)]
    #[clap(author, name = "vesta", bin_name = "vesta", about, long_about = None)]
    /// process options; every flag can also come from its environment
    /// variable
    pub struct Config {
        /// the YAML server config to load
        #[clap(
            short,
            long,
            value_parser,
            env,
            default_value = DEFAULT_CONFIG_PATH
        )]
        pub config_path: PathBuf,
        /// the v6 port to bind per-interface sockets to
        #[clap(long, env, value_parser, default_value_t = DEFAULT_V6_PORT)]
        pub v6_port: u16,
        /// the v4 port to bind per-interface sockets to
        #[clap(long, env, value_parser, default_value_t = DEFAULT_V4_PORT)]
        pub v4_port: u16,
        /// name this instance reports
        #[clap(long, env, value_parser, default_value = DEFAULT_VESTA_ID)]
        pub vesta_id: String,
        /// log filter, same directive syntax as RUST_LOG
        #[clap(long, env, value_parser, default_value = DEFAULT_VESTA_LOG)]
        pub vesta_log: String,
    }

    impl Config {
        /// true when the v6 sockets sit on the IANA server port
        pub fn is_default_port_v6(&self) -> bool {
            self.v6_port == v6::SERVER_PORT
        }
    }
}

pub mod trace {
    //! tracing configuration
    use std::str::FromStr;

    use anyhow::{anyhow, Result};
    use tracing_subscriber::{
        filter::EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt,
        util::SubscriberInitExt,
    };

    /// How log lines are rendered
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum LogFormat {
        /// single line, human readable
        #[default]
        Standard,
        /// one JSON object per event
        Json,
        /// multi-line with indented fields
        Pretty,
    }

    impl FromStr for LogFormat {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> Result<Self> {
            match s {
                "standard" => Ok(LogFormat::Standard),
                "json" => Ok(LogFormat::Json),
                "pretty" => Ok(LogFormat::Pretty),
                other => Err(anyhow!("unknown LOG_FORMAT {other:?}")),
            }
        }
    }

    /// Configuration for log output
    #[derive(Debug)]
    pub struct Config {
        /// rendering picked via LOG_FORMAT
        pub format: LogFormat,
    }

    impl Config {
        /// Install the global subscriber: level directives from
        /// `vesta_log` (a bad spec degrades to `info`), rendering from
        /// the LOG_FORMAT environment variable.
        pub fn parse(vesta_log: &str) -> Result<Self> {
            let format = match std::env::var("LOG_FORMAT") {
                Ok(var) => var.parse()?,
                Err(_) => LogFormat::default(),
            };
            let filter =
                EnvFilter::try_new(vesta_log).unwrap_or_else(|_| EnvFilter::new("info"));

            let registry = tracing_subscriber::registry().with(filter);
            match format {
                LogFormat::Standard => registry.with(fmt::layer()).init(),
                LogFormat::Json => registry.with(fmt::layer().json()).init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
            }

            Ok(Self { format })
        }
    }
}
