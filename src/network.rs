// src/network.rs
// Display addresses for the bound listener

use local_ip_address::local_ip;
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone)]
pub struct ServerAddresses {
    pub local: String,
    pub network: Option<String>,
}

pub struct NetworkUtils;

impl NetworkUtils {
    /// Get the network IP address for external access
    pub fn get_network_address() -> Option<IpAddr> {
        local_ip().ok()
    }

    /// Create server addresses for display from the address actually bound
    pub fn create_server_addresses(bound: SocketAddr) -> ServerAddresses {
        let port = bound.port();

        // A wildcard bind is reachable on localhost and on the LAN address;
        // a specific bind only on that address.
        if bound.ip().is_unspecified() {
            let network = Self::get_network_address().map(|ip| format_url(ip, port));
            ServerAddresses {
                local: format!("http://localhost:{}", port),
                network,
            }
        } else {
            ServerAddresses {
                local: format_url(bound.ip(), port),
                network: None,
            }
        }
    }
}

fn format_url(ip: IpAddr, port: u16) -> String {
    match ip {
        IpAddr::V6(v6) => format!("http://[{}]:{}", v6, port),
        IpAddr::V4(v4) => format!("http://{}:{}", v4, port),
    }
}
