use crate::crypto::SecretKey;
use crate::peers::NetworkState;
use std::net::Ipv6Addr;

/// Keep-alive interval written into every peer block. Keeps NAT mappings
/// warm between overlay packets.
pub const PERSISTENT_KEEPALIVE_DEFAULT: u16 = 25;

/// Builds the tunnel configuration document.
///
/// One interface block for the local device, then one peer block per entry
/// of `peers`. Pure string construction: peers appear in the iteration order
/// of the supplied map, which is deterministic for a given map but carries no
/// meaning. The caller owns writing the result to disk.
pub fn generate_config(
    secret_key: &SecretKey,
    address: Ipv6Addr,
    listen_port: u16,
    peers: &NetworkState,
) -> String {
    let mut config = String::new();
    config.push_str("[Interface]\n");
    config.push_str(&format!("PrivateKey = {}\n", secret_key.to_base64()));
    config.push_str(&format!("Address = {address}/128\n"));
    config.push_str(&format!("ListenPort = {listen_port}\n"));

    for record in peers.values() {
        config.push_str("\n[Peer]\n");
        config.push_str(&format!("PublicKey = {}\n", record.public_key));
        config.push_str(&format!("AllowedIPs = {}/128\n", record.internal_ip));
        config.push_str(&format!(
            "Endpoint = {}:{}\n",
            record.external_ip, record.external_port
        ));
        config.push_str(&format!(
            "PersistentKeepalive = {PERSISTENT_KEEPALIVE_DEFAULT}\n"
        ));
    }

    config
}
