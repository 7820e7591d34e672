use thiserror::Error;

/// Errors that make a discovery run impossible. Everything else degrades to
/// an empty contribution and is logged where it happens.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid interface name '{0}' (allowed: letters, digits, '.', '_', '-')")]
    InvalidInterfaceName(String),

    #[error("no usable network interface found{}", .0.as_ref().map(|n| format!(" for '{n}'")).unwrap_or_default())]
    NoInterface(Option<String>),

    #[error("none of the requested interfaces has a usable IPv4 subnet")]
    NoUsableSubnet,
}

#[derive(Debug, Error)]
pub enum SnmpError {
    #[error("SNMP request to {0} timed out")]
    Timeout(String),

    #[error("SNMP transport error talking to {target}: {reason}")]
    Transport { target: String, reason: String },

    #[error("malformed SNMP row {oid}: {reason}")]
    MalformedRow { oid: String, reason: String },

    #[error("invalid OID '{0}'")]
    InvalidOid(String),
}

#[derive(Debug, Error)]
pub enum RemoteExecError {
    #[error("TCP connect to {0} failed: {1}")]
    Connect(String, String),

    #[error("SSH handshake with {0} failed: {1}")]
    Handshake(String, String),

    #[error("host key for {0} does not match known_hosts")]
    HostKeyMismatch(String),

    #[error("SSH authentication as '{user}' on {host} failed")]
    Auth { host: String, user: String },

    #[error("remote command on {host} failed: {reason}")]
    Command { host: String, reason: String },

    #[error("remote command on {0} timed out")]
    Timeout(String),
}

/// A single malformed command-line entry. Always skipped with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("expected {expected}, got '{entry}'")]
    Malformed { entry: String, expected: &'static str },

    #[error("'{0}' is not a valid IPv4 address")]
    InvalidIp(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_interface_message_names_the_interface() {
        let err = DiscoveryError::NoInterface(Some("eth9".into()));
        assert_eq!(err.to_string(), "no usable network interface found for 'eth9'");
        let err = DiscoveryError::NoInterface(None);
        assert_eq!(err.to_string(), "no usable network interface found");
    }
}
