//! Deterministic overlay addressing.
//!
//! Every device's overlay address is derived purely from its identity
//! strings, so the network needs no address allocator and no participant ever
//! has to be renumbered. The 128 address bits are partitioned into four
//! fixed-width segments:
//!
//! ```text
//! [ 8-bit local prefix | 40-bit team | 40-bit user | 40-bit device ]
//! ```
//!
//! Each 40-bit segment is the leading five bytes of a SHA-256 digest over the
//! corresponding identity string. All devices of a user share an /88, all
//! devices of a team share a /48.

use ipnet::Ipv6Net;
use sha2::{Digest, Sha256};
use std::net::Ipv6Addr;

/// First address byte shared by all overlay addresses. Placed in the
/// IPv6 unique-local range so overlay traffic is never routable beyond the
/// tunnel interfaces.
pub const LOCAL_PREFIX: u8 = 0xfd;

/// Suffix appended to the team name before hashing. Keeps the team segment
/// distinct from a hypothetical user or device that happens to carry the
/// same string.
const TEAM_SALT: &str = "/teamnet";

/// Width of one identity-derived segment in bytes.
const SEGMENT_LEN: usize = 5;

/// Prefix length of the aggregate shared by all devices of a team.
pub const TEAM_PREFIX_LEN: u8 = 48;

/// Prefix length of the aggregate shared by all devices of a user.
pub const USER_PREFIX_LEN: u8 = 88;

/// Leading five bytes of the SHA-256 digest over `input`. Truncation always
/// takes the front of the digest so the three segments of an address cannot
/// end up correlated through a shared digest tail.
fn segment(input: &str) -> [u8; SEGMENT_LEN] {
    let digest = Sha256::digest(input.as_bytes());
    let mut seg = [0u8; SEGMENT_LEN];
    seg.copy_from_slice(&digest[..SEGMENT_LEN]);
    seg
}

/// Derives the overlay address for a device.
///
/// Pure and total: identical `(team, user, device)` inputs always yield the
/// identical address, independent of who else is or was part of the team.
pub fn derive_address(team: &str, user: &str, device: &str) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets[0] = LOCAL_PREFIX;
    octets[1..6].copy_from_slice(&segment(&format!("{team}{TEAM_SALT}")));
    octets[6..11].copy_from_slice(&segment(user));
    octets[11..16].copy_from_slice(&segment(device));
    Ipv6Addr::from(octets)
}

/// Aggregate covering every device of a team.
pub fn team_subnet(team: &str) -> Ipv6Net {
    let mut octets = [0u8; 16];
    octets[0] = LOCAL_PREFIX;
    octets[1..6].copy_from_slice(&segment(&format!("{team}{TEAM_SALT}")));
    Ipv6Net::new(Ipv6Addr::from(octets), TEAM_PREFIX_LEN).expect("prefix length is valid")
}

/// Aggregate covering every device of a user within a team.
pub fn user_subnet(team: &str, user: &str) -> Ipv6Net {
    let mut octets = [0u8; 16];
    octets[0] = LOCAL_PREFIX;
    octets[1..6].copy_from_slice(&segment(&format!("{team}{TEAM_SALT}")));
    octets[6..11].copy_from_slice(&segment(user));
    Ipv6Net::new(Ipv6Addr::from(octets), USER_PREFIX_LEN).expect("prefix length is valid")
}

/// Renders address bytes for display. A full 16 bytes renders as a bare
/// address; anything shorter is zero-padded and rendered as a subnet
/// literal with the prefix length implied by the input length.
pub fn format_address(bytes: &[u8]) -> String {
    let mut octets = [0u8; 16];
    let len = bytes.len().min(16);
    octets[..len].copy_from_slice(&bytes[..len]);
    let addr = Ipv6Addr::from(octets);
    if len == 16 {
        addr.to_string()
    } else {
        format!("{}/{}", addr, len * 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_address_is_deterministic() {
        let a = derive_address("eng", "alice", "laptop");
        let b = derive_address("eng", "alice", "laptop");
        assert_eq!(a, b);
        assert_eq!(a.octets().len(), 16);
        assert_eq!(a.octets()[0], LOCAL_PREFIX);
    }

    #[test]
    fn derive_address_is_stable_across_releases() {
        // pinned vector: the derivation must survive process restarts and
        // version upgrades, otherwise every running overlay renumbers
        let addr = derive_address("eng", "alice", "laptop");
        assert_eq!(
            addr,
            "fd38:eacd:b734:2bd8:6c9:7f5e:ec0d:c419"
                .parse::<Ipv6Addr>()
                .unwrap()
        );
        assert_eq!(team_subnet("eng").to_string(), "fd38:eacd:b734::/48");
    }

    #[test]
    fn derive_address_changes_with_any_input() {
        let base = derive_address("eng", "alice", "laptop");
        assert_ne!(base, derive_address("ops", "alice", "laptop"));
        assert_ne!(base, derive_address("eng", "bob", "laptop"));
        assert_ne!(base, derive_address("eng", "alice", "phone"));
    }

    #[test]
    fn address_is_unaffected_by_other_peers() {
        // deriving addresses for unrelated devices must not shift an
        // already-derived one
        let before = derive_address("eng", "alice", "laptop");
        let _ = derive_address("eng", "bob", "desktop");
        let _ = derive_address("eng", "carol", "phone");
        let after = derive_address("eng", "alice", "laptop");
        assert_eq!(before, after);
    }

    #[test]
    fn devices_of_a_user_share_the_user_subnet() {
        let subnet = user_subnet("eng", "alice");
        assert!(subnet.contains(&derive_address("eng", "alice", "laptop")));
        assert!(subnet.contains(&derive_address("eng", "alice", "phone")));
        assert!(!subnet.contains(&derive_address("eng", "bob", "laptop")));
    }

    #[test]
    fn devices_of_a_team_share_the_team_subnet() {
        let subnet = team_subnet("eng");
        assert_eq!(subnet.prefix_len(), TEAM_PREFIX_LEN);
        assert!(subnet.contains(&derive_address("eng", "alice", "laptop")));
        assert!(subnet.contains(&derive_address("eng", "bob", "desktop")));
        assert!(!subnet.contains(&derive_address("ops", "alice", "laptop")));
    }

    #[test]
    fn team_and_user_segments_are_not_correlated() {
        // the same string as team and as user must produce different
        // segments, otherwise the salt is broken
        let a = derive_address("alice", "alice", "alice");
        let octets = a.octets();
        assert_ne!(octets[1..6], octets[6..11]);
    }

    #[test]
    fn format_full_address() {
        let addr = derive_address("eng", "alice", "laptop");
        assert_eq!(format_address(&addr.octets()), addr.to_string());
    }

    #[test]
    fn format_subnet_literal() {
        let subnet = team_subnet("eng");
        let rendered = format_address(&subnet.addr().octets()[..6]);
        assert!(rendered.ends_with("/48"));
        assert_eq!(rendered, subnet.to_string());

        let user = user_subnet("eng", "alice");
        let rendered = format_address(&user.addr().octets()[..11]);
        assert!(rendered.ends_with("/88"));
        assert_eq!(rendered, user.to_string());
    }
}
