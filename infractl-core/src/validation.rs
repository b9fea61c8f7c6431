use std::fmt::{Display, Formatter};

use ipnet::{IpNet, Ipv4Net};
use thiserror::Error;

/// Smallest accepted network, anything narrower leaves too little room for services.
pub const MAX_PREFIX_LEN: u8 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Network CIDR cannot be empty!")]
    EmptyNetworkBlock,
    #[error("Invalid network CIDR format ({})!", .0)]
    InvalidNetworkBlock(String),
    #[error("Network CIDR must be IPv4, IPv6 isn't supported ({})!", .0)]
    Ipv6Unsupported(String),
    #[error("Network CIDR must represent a network, not a host address ({}, did you mean {}?)!", .0, .1)]
    HostAddress(String, Ipv4Net),
    #[error("Network CIDR must be a private network (10.0.0.0/8, 172.16.0.0/12 or 192.168.0.0/16), got {}!", .0)]
    NotPrivate(Ipv4Net),
    #[error("Network CIDR subnet is too small, use /24 or larger (got /{})!", .0)]
    TooSmall(u8),
    #[error("Domain is required!")]
    EmptyDomain,
    #[error("Admin password is required!")]
    EmptyAdminCredential,
    #[error("Namespace is required!")]
    EmptyNamespace,
    #[error("Release name is required!")]
    EmptyReleaseName,
    #[error("Repository {} is required!", .0)]
    EmptyRepositoryField(&'static str),
    #[error("{}", .0)]
    Service(String),
}

/// Validates an operator-supplied network block.
///
/// The block has to be an IPv4 network address (not a host inside it), lie entirely within
/// one of the private ranges and hold at least 256 addresses.
pub fn validate_network_block(cidr: &str) -> Result<Ipv4Net, ValidationError> {
    let cidr = cidr.trim();

    if cidr.is_empty() {
        return Err(ValidationError::EmptyNetworkBlock);
    }

    let network = match cidr
        .parse::<IpNet>()
        .map_err(|_| ValidationError::InvalidNetworkBlock(cidr.to_owned()))?
    {
        IpNet::V4(network) => network,
        IpNet::V6(_) => return Err(ValidationError::Ipv6Unsupported(cidr.to_owned())),
    };

    if network.addr() != network.network() {
        return Err(ValidationError::HostAddress(cidr.to_owned(), network.trunc()));
    }

    if !network.network().is_private() || !network.broadcast().is_private() {
        return Err(ValidationError::NotPrivate(network));
    }

    if network.prefix_len() > MAX_PREFIX_LEN {
        return Err(ValidationError::TooSmall(network.prefix_len()));
    }

    Ok(network)
}

/// Directory root derived from a domain name, `example.lab` becomes `dc=example,dc=lab`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BaseIdentifier(Vec<String>);

impl BaseIdentifier {
    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for BaseIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

pub fn derive_base_identifier(domain: &str) -> BaseIdentifier {
    BaseIdentifier(
        domain
            .trim()
            .split('.')
            .filter(|label| !label.is_empty())
            .map(|label| format!("dc={label}"))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::{derive_base_identifier, validate_network_block, ValidationError};

    #[test]
    fn accepts_private_networks_up_to_slash_24() {
        for cidr in [
            "10.0.0.0/8",
            "10.20.0.0/16",
            "172.16.0.0/12",
            "172.31.255.0/24",
            "192.168.0.0/16",
            "192.168.100.0/24",
            "192.168.100.0/23",
        ] {
            let network = validate_network_block(cidr).unwrap();
            assert_eq!(network.to_string(), cidr);
        }
    }

    #[test]
    fn rejects_host_addresses() {
        assert!(matches!(
            validate_network_block("192.168.100.1/24"),
            Err(ValidationError::HostAddress(_, network)) if network.to_string() == "192.168.100.0/24"
        ));
    }

    #[test]
    fn rejects_public_and_straddling_networks() {
        for cidr in ["8.8.8.0/24", "172.32.0.0/16", "192.169.0.0/16", "10.0.0.0/7", "0.0.0.0/0"] {
            assert!(
                matches!(validate_network_block(cidr), Err(ValidationError::NotPrivate(_))),
                "{cidr} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_networks_smaller_than_slash_24() {
        assert_eq!(
            validate_network_block("192.168.100.0/25"),
            Err(ValidationError::TooSmall(25))
        );
        assert_eq!(
            validate_network_block("10.1.1.128/30"),
            Err(ValidationError::TooSmall(30))
        );
    }

    #[test]
    fn rejects_garbage_empty_and_ipv6() {
        assert_eq!(validate_network_block("  "), Err(ValidationError::EmptyNetworkBlock));
        assert!(matches!(
            validate_network_block("192.168.100.0"),
            Err(ValidationError::InvalidNetworkBlock(_))
        ));
        assert!(matches!(
            validate_network_block("not-a-cidr"),
            Err(ValidationError::InvalidNetworkBlock(_))
        ));
        assert!(matches!(
            validate_network_block("fd00::/64"),
            Err(ValidationError::Ipv6Unsupported(_))
        ));
    }

    #[test]
    fn derives_base_identifier_from_domain() {
        assert_eq!(derive_base_identifier("example.lab").to_string(), "dc=example,dc=lab");
        assert_eq!(derive_base_identifier("armani.lab").to_string(), "dc=armani,dc=lab");
        assert_eq!(derive_base_identifier(" corp.example.com ").components().len(), 3);
    }

    #[test]
    fn base_identifier_drops_empty_labels() {
        assert_eq!(derive_base_identifier("a..b").to_string(), "dc=a,dc=b");
        assert_eq!(derive_base_identifier(".lab.").to_string(), "dc=lab");
        assert!(derive_base_identifier("").is_empty());
    }
}
