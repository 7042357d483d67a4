//! Address resolution: IPv4-to-MAC lookup, the `resolve` collaborator (§6).
//!
//! There is no ARP wire format in the specification's data model, but
//! resolving a next-hop IP to a destination MAC is the one thing the IPv4
//! send path cannot do without it; this follows RFC 826 directly, the
//! standard way Ethernet networks answer that question.

use super::{InterfaceId, Ipv4Addr, Stack};
use crate::{device::network::MacAddr, log, time};
use utils::errno::{EResult, Errno};

pub const HEADER_LEN: usize = 28;
const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;

const OP_REQUEST: u16 = 1;
const OP_REPLY: u16 = 2;

const RESOLVE_TIMEOUT_MS: u64 = 2000;

pub struct Packet {
	pub oper: u16,
	pub sha: MacAddr,
	pub spa: Ipv4Addr,
	pub tha: MacAddr,
	pub tpa: Ipv4Addr,
}

impl Packet {
	pub fn parse(data: &[u8]) -> Option<Self> {
		if data.len() < HEADER_LEN {
			return None;
		}
		let htype = u16::from_be_bytes([data[0], data[1]]);
		let ptype = u16::from_be_bytes([data[2], data[3]]);
		let hlen = data[4];
		let plen = data[5];
		if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || hlen != 6 || plen != 4 {
			return None;
		}
		Some(Self {
			oper: u16::from_be_bytes([data[6], data[7]]),
			sha: data[8..14].try_into().unwrap(),
			spa: data[14..18].try_into().unwrap(),
			tha: data[18..24].try_into().unwrap(),
			tpa: data[24..28].try_into().unwrap(),
		})
	}

	pub fn build(oper: u16, sha: MacAddr, spa: Ipv4Addr, tha: MacAddr, tpa: Ipv4Addr) -> [u8; HEADER_LEN] {
		let mut buf = [0u8; HEADER_LEN];
		buf[0..2].copy_from_slice(&HTYPE_ETHERNET.to_be_bytes());
		buf[2..4].copy_from_slice(&PTYPE_IPV4.to_be_bytes());
		buf[4] = 6;
		buf[5] = 4;
		buf[6..8].copy_from_slice(&oper.to_be_bytes());
		buf[8..14].copy_from_slice(&sha);
		buf[14..18].copy_from_slice(&spa);
		buf[18..24].copy_from_slice(&tha);
		buf[24..28].copy_from_slice(&tpa);
		buf
	}
}

impl Stack {
	/// Handles an incoming ARP packet: answers requests for our interface
	/// address, and learns the sender's mapping either way.
	pub(super) fn handle_arp(&mut self, iface_id: InterfaceId, data: &[u8]) {
		let Some(pkt) = Packet::parse(data) else {
			log!("arp", "malformed packet, dropping");
			return;
		};
		self.arp_cache.retain(|(ip, _)| *ip != pkt.spa);
		self.arp_cache.push((pkt.spa, pkt.sha));

		if pkt.oper != OP_REQUEST {
			return;
		}
		let Some(iface) = self.interfaces.get_mut(iface_id) else {
			return;
		};
		if iface.ip != Some(pkt.tpa) {
			return;
		}
		let reply = Packet::build(OP_REPLY, iface.mac, pkt.tpa, pkt.sha, pkt.spa);
		let _ = iface.device.send(eth_arp_type(), pkt.sha, &reply);
	}

	/// Resolves `ip` to a MAC address on interface `iface_id`, sending an ARP
	/// request and polling the stack until an answer arrives or 2 s elapse.
	pub fn resolve(&mut self, iface_id: InterfaceId, ip: Ipv4Addr) -> EResult<MacAddr> {
		if let Some((_, mac)) = self.arp_cache.iter().find(|(cached, _)| *cached == ip) {
			return Ok(*mac);
		}
		let (mac, spa) = {
			let iface = self.interfaces.get(iface_id).ok_or(Errno::EINVAL)?;
			(iface.mac, iface.ip.unwrap_or([0, 0, 0, 0]))
		};
		let request = Packet::build(OP_REQUEST, mac, spa, [0; 6], ip);
		self.interfaces[iface_id]
			.device
			.send(eth_arp_type(), [0xff; 6], &request)
			.map_err(|_| Errno::EIO)?;

		let deadline = time::uptime_ms() + RESOLVE_TIMEOUT_MS;
		while time::uptime_ms() < deadline {
			self.poll();
			if let Some((_, mac)) = self.arp_cache.iter().find(|(cached, _)| *cached == ip) {
				return Ok(*mac);
			}
			core::hint::spin_loop();
		}
		Err(Errno::ETIMEDOUT)
	}
}

fn eth_arp_type() -> u16 {
	super::eth::ETHERTYPE_ARP
}
