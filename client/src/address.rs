use crate::error::SessionError;

/// Splits a configured `host:port` string. The port is whatever follows the
/// last colon.
pub fn parse_address(value: &str) -> Result<(String, u16), SessionError> {
    let invalid = || SessionError::InvalidAddress(value.to_string());
    let (host, port) = value.trim().rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    let host = host
        .strip_prefix('[')
        .and_then(|host| host.strip_suffix(']'))
        .unwrap_or(host);
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(
            parse_address("127.0.0.1:9999").unwrap(),
            ("127.0.0.1".to_string(), 9999)
        );
        assert_eq!(
            parse_address(" sketch.local:6666 ").unwrap(),
            ("sketch.local".to_string(), 6666)
        );
        assert_eq!(parse_address("[::1]:80").unwrap(), ("::1".to_string(), 80));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for value in ["127.0.0.1", "host:", ":80", "host:port", "host:70000", ""] {
            assert!(
                matches!(parse_address(value), Err(SessionError::InvalidAddress(v)) if v == value),
                "{value:?} should be rejected"
            );
        }
    }
}
