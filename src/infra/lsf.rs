//! LSF environment integration.

use crate::application::ports::HostSource;

const HOSTS_ENV: &str = "LSB_HOSTS";

/// Reads the current LSF allocation from `LSB_HOSTS`.
///
/// LSF repeats a hostname once per slot granted on it, which is exactly the
/// multiplicity the port math wants.
pub struct LsfHosts;

impl HostSource for LsfHosts {
    fn hosts(&self) -> Vec<String> {
        std::env::var(HOSTS_ENV)
            .map(|raw| parse_hosts(&raw))
            .unwrap_or_default()
    }
}

fn parse_hosts(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_any_whitespace() {
        assert_eq!(
            parse_hosts("node1 node1\tnode2\n node3"),
            vec!["node1", "node1", "node2", "node3"]
        );
    }

    #[test]
    fn an_empty_value_means_no_hosts() {
        assert!(parse_hosts("").is_empty());
        assert!(parse_hosts("   ").is_empty());
    }
}
