/// Map a container port number to the application protocol assumed for it.
///
/// Fixed well-known-ports table; anything unrecognized is the generic
/// stream label `tcp`. `udp` is never inferred; it is only taken verbatim
/// from an explicit declaration or from image introspection.
pub fn port_protocol(port: u16) -> &'static str {
    match port {
        80 | 8080 | 8081 | 8888 => "http",
        443 | 8443 => "https",
        3306 => "mysql",
        _ => "tcp",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_ports() {
        assert_eq!(port_protocol(80), "http");
        assert_eq!(port_protocol(8080), "http");
        assert_eq!(port_protocol(443), "https");
        assert_eq!(port_protocol(8443), "https");
        assert_eq!(port_protocol(3306), "mysql");
    }

    #[test]
    fn unknown_ports_default_to_tcp() {
        assert_eq!(port_protocol(9090), "tcp");
        assert_eq!(port_protocol(1), "tcp");
        assert_eq!(port_protocol(65535), "tcp");
    }

    #[test]
    fn udp_is_never_inferred() {
        for port in [53, 123, 161, 514] {
            assert_ne!(port_protocol(port), "udp");
        }
    }
}
