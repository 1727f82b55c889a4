use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use tracing::debug;

/// Local IP used to reach the outside, or loopback when there is no route.
///
/// Connecting a UDP socket sends nothing; it only selects a source address.
pub fn discover_local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            debug!("Local IP discovery failed ({}), using loopback", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
