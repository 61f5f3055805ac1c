//! Server wire config: the leased network and the DDNS policy.
use std::net::Ipv6Addr;
use std::path::Path;

use anyhow::{Context, Result};
use ddns::DdnsPolicy;
use serde::{Deserialize, Serialize};

/// The network addresses are leased from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Network {
    /// identifier recorded on every lease from this network
    pub subnet_id: u32,
    /// first leasable address
    pub range_start: Ipv6Addr,
    /// last leasable address
    pub range_end: Ipv6Addr,
    /// preferred lifetime handed out, seconds
    #[serde(default = "default_preferred")]
    pub preferred_lft: u32,
    /// valid lifetime handed out, seconds
    #[serde(default = "default_valid")]
    pub valid_lft: u32,
    /// renewal time, seconds
    #[serde(default = "default_t1")]
    pub t1: u32,
    /// rebind time, seconds
    #[serde(default = "default_t2")]
    pub t2: u32,
}

fn default_preferred() -> u32 {
    3000
}
fn default_valid() -> u32 {
    4000
}
fn default_t1() -> u32 {
    1000
}
fn default_t2() -> u32 {
    2000
}

impl Network {
    /// iterate the leasable addresses in order
    pub fn range(&self) -> impl Iterator<Item = Ipv6Addr> {
        let start = u128::from(self.range_start);
        let end = u128::from(self.range_end);
        (start..=end).map(Ipv6Addr::from)
    }

    /// is `addr` leasable from this network
    pub fn contains(&self, addr: Ipv6Addr) -> bool {
        (self.range_start..=self.range_end).contains(&addr)
    }
}

/// Top-level server config, parsed from YAML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DhcpConfig {
    /// the network to lease from
    pub network: Network,
    /// DDNS behavior
    #[serde(default)]
    pub ddns: DdnsPolicy,
}

impl DhcpConfig {
    /// read & parse the config file
    pub fn parse(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_yaml::from_str(&contents).context("failed to parse config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml() {
        let cfg: DhcpConfig = serde_yaml::from_str(
            r#"
network:
  subnet_id: 1
  range_start: "2001:db8:1:1::100"
  range_end: "2001:db8:1:1::1ff"
  valid_lft: 7200
ddns:
  enable_updates: true
  allow_client_update: false
  default_suffix: "example.org."
"#,
        )
        .unwrap();
        assert_eq!(cfg.network.subnet_id, 1);
        assert_eq!(cfg.network.valid_lft, 7200);
        // unspecified fields keep defaults
        assert_eq!(cfg.network.preferred_lft, 3000);
        assert!(!cfg.ddns.allow_client_update);
        assert_eq!(cfg.ddns.default_suffix, "example.org.");
    }

    #[test]
    fn range_iterates_inclusive() {
        let net = Network {
            subnet_id: 1,
            range_start: "2001:db8::1".parse().unwrap(),
            range_end: "2001:db8::3".parse().unwrap(),
            preferred_lft: 3000,
            valid_lft: 4000,
            t1: 1000,
            t2: 2000,
        };
        let addrs: Vec<_> = net.range().collect();
        assert_eq!(addrs.len(), 3);
        assert!(net.contains("2001:db8::2".parse().unwrap()));
        assert!(!net.contains("2001:db8::4".parse().unwrap()));
    }
}
