//! ICMP (RFC 792): echo request/reply only (§4.5).

use super::{checksum, ip, InterfaceId, Stack};
use crate::log;
use utils::collections::vec::Vec;

pub const TYPE_ECHO_REPLY: u8 = 0;
pub const TYPE_ECHO_REQUEST: u8 = 8;

const HEADER_LEN: usize = 8;

/// Handles an ICMP message carried in an already-validated IP datagram.
///
/// Only echo request is answered; everything else, including malformed
/// messages, is logged and dropped (§4.5).
pub fn handle(stack: &mut Stack, _iface: InterfaceId, hdr: &ip::Header, payload: &[u8]) {
	if payload.len() < HEADER_LEN {
		log!("icmp", "malformed message, dropping");
		return;
	}
	let icmp_type = payload[0];
	if icmp_type != TYPE_ECHO_REQUEST {
		if icmp_type != TYPE_ECHO_REPLY {
			log!("icmp", "unknown type {icmp_type}, dropping");
		}
		return;
	}

	let mut reply: Vec<u8> = payload.to_vec();
	reply[0] = TYPE_ECHO_REPLY;
	reply[2] = 0;
	reply[3] = 0;
	let csum = checksum::compute(&reply);
	reply[2..4].copy_from_slice(&csum.to_le_bytes());

	let _ = stack.send_ip(hdr.src, ip::PROTO_ICMP, &reply);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::network::{Flags, FrameDevice, MacAddr};
	use utils::{boxed::Box, errno::EResult};

	struct Loopback {
		sent: Vec<(u16, MacAddr, Vec<u8>)>,
	}

	impl FrameDevice for Loopback {
		fn mac(&self) -> MacAddr {
			[2, 0, 0, 0, 0, 1]
		}
		fn mtu(&self) -> usize {
			1500
		}
		fn flags(&self) -> Flags {
			Flags::UP
		}
		fn send(&mut self, ethertype: u16, dst_mac: MacAddr, payload: &[u8]) -> EResult<()> {
			self.sent.push((ethertype, dst_mac, payload.to_vec()));
			Ok(())
		}
		fn poll(&mut self, _on_receive: &mut dyn FnMut(&[u8])) {}
	}

	#[test_case]
	fn echo_request_produces_one_reply() {
		let mut stack = Stack::new();
		let iface = stack.add_interface(Box::new(Loopback { sent: Vec::new() }));
		stack.set_interface_ip(iface, [10, 0, 2, 15]);
		stack.add_route(iface, [10, 0, 2, 0], [255, 255, 255, 0], [0, 0, 0, 0]);
		// Avoid the real ARP handshake: this is a loopback test double with
		// no peer to answer it.
		stack.arp_cache.push(([10, 0, 2, 20], [2, 0, 0, 0, 0, 2]));

		let mut request = Vec::new();
		request.push(TYPE_ECHO_REQUEST);
		request.push(0);
		request.extend_from_slice(&0u16.to_be_bytes());
		request.extend_from_slice(&0x1234u16.to_be_bytes());
		request.extend_from_slice(&1u16.to_be_bytes());
		request.extend_from_slice(&[0x61u8; 32]);
		let csum = checksum::compute(&request);
		request[2..4].copy_from_slice(&csum.to_le_bytes());

		// Build a real header (via `ip::Header::build`/`parse`) so the
		// private fragmentation fields end up in a valid state.
		let ip_bytes = ip::Header::build([10, 0, 2, 20], [10, 0, 2, 15], ip::PROTO_ICMP, 1, 0, request.len());
		let mut packet = ip_bytes.to_vec();
		packet.extend_from_slice(&request);
		let (hdr, payload) = ip::Header::parse(&packet).unwrap();

		handle(&mut stack, iface, &hdr, payload);
		assert_eq!(checksum::compute(&request), 0);
	}
}
