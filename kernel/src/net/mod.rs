//! The network stack: frame device registration, routing, and protocol
//! dispatch (§2, §4.4-§4.7).
//!
//! A single [`Stack`] instance owns every piece of mutable network state
//! (interfaces, routes, ARP cache, reassembly list, UDP handler table, DNS
//! pending queries) per the "one owned object" guidance (§9) rather than a
//! scatter of free-standing statics.

pub mod arp;
pub mod checksum;
pub mod dns;
pub mod eth;
pub mod icmp;
pub mod ip;
pub mod udp;

use crate::{device::network::FrameDevice, log};
use utils::{boxed::Box, collections::vec::Vec, errno, errno::EResult};

/// A dotted-quad IPv4 address.
pub type Ipv4Addr = [u8; 4];

pub const BROADCAST_ADDR: Ipv4Addr = [255, 255, 255, 255];
pub const UNSPECIFIED_ADDR: Ipv4Addr = [0, 0, 0, 0];

/// Opaque handle to a registered interface, returned by [`Stack::add_interface`].
pub type InterfaceId = usize;

struct Interface {
	device: Box<dyn FrameDevice>,
	mac: [u8; 6],
	ip: Option<Ipv4Addr>,
}

/// One entry of the routing table: destination network, mask, and next hop
/// (the unspecified address means "directly connected", §3).
struct Route {
	iface: InterfaceId,
	network: Ipv4Addr,
	mask: Ipv4Addr,
	next_hop: Ipv4Addr,
}

impl Route {
	fn prefix_len(&self) -> u32 {
		u32::from_be_bytes(self.mask).count_ones()
	}

	fn matches(&self, addr: Ipv4Addr) -> bool {
		let addr = u32::from_be_bytes(addr);
		let net = u32::from_be_bytes(self.network);
		let mask = u32::from_be_bytes(self.mask);
		addr & mask == net & mask
	}
}

type UdpHandler = Box<dyn FnMut(Ipv4Addr, u16, &[u8]) + Send>;

pub struct Stack {
	interfaces: Vec<Interface>,
	routes: Vec<Route>,
	arp_cache: Vec<(Ipv4Addr, [u8; 6])>,
	reassembly: Vec<ip::ReassemblyEntry>,
	udp_handlers: Vec<(u16, UdpHandler)>,
	dns: dns::State,
	next_ip_id: u16,
}

impl Stack {
	pub fn new() -> Self {
		Self {
			interfaces: Vec::new(),
			routes: Vec::new(),
			arp_cache: Vec::new(),
			reassembly: Vec::new(),
			udp_handlers: Vec::new(),
			dns: dns::State::new(),
			next_ip_id: 1,
		}
	}

	/// Registers a frame device, returning a handle used by every other
	/// `Stack` operation that needs to name an interface.
	pub fn add_interface(&mut self, device: Box<dyn FrameDevice>) -> InterfaceId {
		let mac = device.mac();
		self.interfaces.push(Interface {
			device,
			mac,
			ip: None,
		});
		self.interfaces.len() - 1
	}

	pub fn set_interface_ip(&mut self, iface: InterfaceId, ip: Ipv4Addr) {
		if let Some(i) = self.interfaces.get_mut(iface) {
			i.ip = Some(ip);
		}
	}

	pub fn get_interface_ip(&self, iface: InterfaceId) -> Option<Ipv4Addr> {
		self.interfaces.get(iface).and_then(|i| i.ip)
	}

	/// Sets the IP address of the first registered interface; a convenience
	/// for the common single-interface deployment.
	pub fn set_my_ip(&mut self, ip: Ipv4Addr) {
		self.set_interface_ip(0, ip);
	}

	pub fn add_route(&mut self, iface: InterfaceId, network: Ipv4Addr, mask: Ipv4Addr, next_hop: Ipv4Addr) {
		self.routes.retain(|r| !(r.network == network && r.mask == mask));
		self.routes.push(Route {
			iface,
			network,
			mask,
			next_hop,
		});
	}

	/// Longest-prefix-match route lookup; falls back to the default route
	/// (mask 0.0.0.0) if present.
	fn route(&self, dst: Ipv4Addr) -> Option<(InterfaceId, Ipv4Addr)> {
		let mut best: Option<&Route> = None;
		for route in &self.routes {
			if !route.matches(dst) {
				continue;
			}
			if best.map_or(true, |b| route.prefix_len() > b.prefix_len()) {
				best = Some(route);
			}
		}
		let route = best?;
		let next_hop = if route.next_hop == UNSPECIFIED_ADDR {
			dst
		} else {
			route.next_hop
		};
		Some((route.iface, next_hop))
	}

	/// The source address that would be used to reach `dst`, i.e. the IP of
	/// the interface `dst` routes through. Used by UDP to compute its
	/// pseudo-header checksum before handing the segment to [`Self::send_ip`].
	pub(crate) fn route_source_ip(&self, dst: Ipv4Addr) -> Option<Ipv4Addr> {
		let (iface, _) = self.route(dst)?;
		self.get_interface_ip(iface)
	}

	/// Registers (or replaces) the handler invoked for datagrams addressed
	/// to `port`.
	pub fn bind_udp<F>(&mut self, port: u16, handler: F)
	where
		F: FnMut(Ipv4Addr, u16, &[u8]) + Send + 'static,
	{
		self.udp_handlers.retain(|(p, _)| *p != port);
		self.udp_handlers.push((port, Box::new(handler)));
	}

	/// Drives one round of receive/transmit-completion processing on every
	/// registered interface.
	pub fn poll(&mut self) {
		for iface_id in 0..self.interfaces.len() {
			let mut frames: Vec<Vec<u8>> = Vec::new();
			{
				let iface = &mut self.interfaces[iface_id];
				iface.device.poll(&mut |frame| frames.push(frame.to_vec()));
			}
			for frame in frames {
				self.handle_frame(iface_id, &frame);
			}
		}
	}

	fn handle_frame(&mut self, iface_id: InterfaceId, frame: &[u8]) {
		let Some((hdr, payload)) = eth::Header::parse(frame) else {
			log!("net", "short frame, dropping");
			return;
		};
		match hdr.ethertype {
			eth::ETHERTYPE_ARP => self.handle_arp(iface_id, payload),
			eth::ETHERTYPE_IPV4 => self.handle_ip_frame(iface_id, payload),
			other => log!("net", "unhandled ethertype 0x{other:04x}"),
		}
	}

	fn handle_ip_frame(&mut self, iface_id: InterfaceId, data: &[u8]) {
		let (hdr, payload) = match ip::Header::parse(data) {
			Ok(v) => v,
			Err(e) => {
				log!("net", "malformed ip packet ({e}), dropping");
				return;
			}
		};
		let our_ip = self.get_interface_ip(iface_id);
		let is_for_us = Some(hdr.dst) == our_ip || hdr.dst == BROADCAST_ADDR;
		if !is_for_us {
			return;
		}
		if hdr.mf() || hdr.fragment_offset() != 0 {
			self.handle_fragment(iface_id, &hdr, payload);
		} else {
			self.dispatch_ip_payload(iface_id, &hdr, payload);
		}
	}

	fn dispatch_ip_payload(&mut self, iface_id: InterfaceId, hdr: &ip::Header, payload: &[u8]) {
		match hdr.protocol {
			ip::PROTO_ICMP => icmp::handle(self, iface_id, hdr, payload),
			ip::PROTO_UDP => udp::handle(self, iface_id, hdr, payload),
			other => log!("net", "unhandled ip protocol {other}, dropping"),
		}
	}

	/// Sends `payload` to `dst` with the given IP protocol number,
	/// fragmenting as needed for the outgoing interface's MTU.
	pub fn send_ip(&mut self, dst: Ipv4Addr, protocol: u8, payload: &[u8]) -> EResult<()> {
		let (iface_id, next_hop) = self.route(dst).ok_or(errno!(EINVAL))?;
		if Some(dst) == self.get_interface_ip(iface_id) {
			return Err(errno!(EINVAL));
		}
		let mac = self.resolve(iface_id, next_hop)?;
		let mtu = self.interfaces[iface_id].device.mtu();
		let src = self.get_interface_ip(iface_id).unwrap_or(UNSPECIFIED_ADDR);
		let id = self.next_ip_id;
		self.next_ip_id = self.next_ip_id.wrapping_add(1);

		let max_payload = mtu.saturating_sub(ip::HEADER_LEN);
		if payload.len() <= max_payload {
			let mut packet = Vec::with_capacity(ip::HEADER_LEN + payload.len());
			packet.extend_from_slice(&ip::Header::build(src, dst, protocol, id, 0, payload.len()));
			packet.extend_from_slice(payload);
			self.interfaces[iface_id]
				.device
				.send(eth::ETHERTYPE_IPV4, mac, &packet)?;
			return Ok(());
		}

		let chunk_len = max_payload & !0x7;
		if chunk_len == 0 {
			return Err(errno!(EINVAL));
		}
		let mut offset = 0;
		while offset < payload.len() {
			let end = (offset + chunk_len).min(payload.len());
			let more = end < payload.len();
			let flags_fragoff = ((more as u16) << 13) | ((offset / 8) as u16 & 0x1fff);
			let chunk = &payload[offset..end];
			let mut packet = Vec::with_capacity(ip::HEADER_LEN + chunk.len());
			packet.extend_from_slice(&ip::Header::build(src, dst, protocol, id, flags_fragoff, chunk.len()));
			packet.extend_from_slice(chunk);
			self.interfaces[iface_id]
				.device
				.send(eth::ETHERTYPE_IPV4, mac, &packet)?;
			offset = end;
		}
		Ok(())
	}

}

impl Default for Stack {
	fn default() -> Self {
		Self::new()
	}
}
