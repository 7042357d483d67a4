//! UDP (RFC 768): header, pseudo-header checksum, per-port handler table
//! (§4.6).

use super::{checksum, ip, InterfaceId, Ipv4Addr, Stack};
use crate::log;
use utils::{collections::vec::Vec, errno::EResult};

pub const HEADER_LEN: usize = 8;

/// Handles a UDP datagram carried in an already-validated IP datagram:
/// looks up the handler bound to the destination port and invokes it with
/// `(source IP, source port, payload)`.
pub fn handle(stack: &mut Stack, _iface: InterfaceId, hdr: &ip::Header, payload: &[u8]) {
	if payload.len() < HEADER_LEN {
		log!("udp", "malformed datagram, dropping");
		return;
	}
	let src_port = u16::from_be_bytes([payload[0], payload[1]]);
	let dst_port = u16::from_be_bytes([payload[2], payload[3]]);
	let length = u16::from_be_bytes([payload[4], payload[5]]) as usize;
	if length < HEADER_LEN || length > payload.len() {
		log!("udp", "malformed length, dropping");
		return;
	}
	if !verify_checksum(hdr.src, hdr.dst, &payload[..length]) {
		log!("udp", "bad checksum, dropping");
		return;
	}
	let body = &payload[HEADER_LEN..length];
	match stack.udp_handlers.iter_mut().find(|(port, _)| *port == dst_port) {
		Some((_, handler)) => handler(hdr.src, src_port, body),
		None => log!("udp", "no handler for port {dst_port}, dropping"),
	}
}

/// Builds and sends a UDP datagram through the IP layer.
pub fn send(stack: &mut Stack, dst: Ipv4Addr, src_port: u16, dst_port: u16, payload: &[u8]) -> EResult<()> {
	let src = stack.route_source_ip(dst).unwrap_or(super::UNSPECIFIED_ADDR);
	let length = HEADER_LEN + payload.len();
	let mut datagram = Vec::with_capacity(length);
	datagram.extend_from_slice(&src_port.to_be_bytes());
	datagram.extend_from_slice(&dst_port.to_be_bytes());
	datagram.extend_from_slice(&(length as u16).to_be_bytes());
	datagram.extend_from_slice(&0u16.to_be_bytes());
	datagram.extend_from_slice(payload);
	let csum = pseudo_header_checksum(src, dst, &datagram);
	datagram[6..8].copy_from_slice(&csum.to_le_bytes());
	stack.send_ip(dst, ip::PROTO_UDP, &datagram)
}

fn pseudo_header_checksum(src: Ipv4Addr, dst: Ipv4Addr, segment: &[u8]) -> u16 {
	let udp_len = (segment.len() as u16).to_be_bytes();
	let pseudo = [src[0], src[1], src[2], src[3], dst[0], dst[1], dst[2], dst[3], 0, ip::PROTO_UDP, udp_len[0], udp_len[1]];
	checksum::compute_segments(&[&pseudo, segment])
}

fn verify_checksum(src: Ipv4Addr, dst: Ipv4Addr, segment: &[u8]) -> bool {
	// A stored checksum of 0 means "not computed" (RFC 768): skip verification.
	if segment.len() >= 8 && segment[6] == 0 && segment[7] == 0 {
		return true;
	}
	pseudo_header_checksum(src, dst, segment) == 0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_case]
	fn pseudo_header_checksum_round_trip() {
		let src = [10, 0, 2, 15];
		let dst = [10, 0, 2, 3];
		let mut datagram = Vec::new();
		datagram.extend_from_slice(&1234u16.to_be_bytes());
		datagram.extend_from_slice(&53u16.to_be_bytes());
		datagram.extend_from_slice(&((HEADER_LEN + 4) as u16).to_be_bytes());
		datagram.extend_from_slice(&0u16.to_be_bytes());
		datagram.extend_from_slice(&[1, 2, 3, 4]);
		let csum = pseudo_header_checksum(src, dst, &datagram);
		datagram[6..8].copy_from_slice(&csum.to_le_bytes());
		assert!(verify_checksum(src, dst, &datagram));
	}
}
