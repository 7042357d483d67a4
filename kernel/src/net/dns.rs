//! DNS client (RFC 1035): A-record queries only, with compression-pointer
//! decoding on receive (§4.7).

use super::{udp, Ipv4Addr, Stack};
use crate::{log, time};
use utils::{
	collections::{string::String, vec::Vec},
	errno,
	errno::EResult,
	lock::Mutex,
	ptr::arc::Arc,
};

const QUERY_PORT: u16 = 53;
/// Fixed ephemeral port the client binds once, on its first query.
const CLIENT_PORT: u16 = 50053;
const TIMEOUT_MS: u64 = 5_000;
const POLL_INTERVAL_MS: u64 = 10;
const PROGRESS_LOG_MS: u64 = 1_000;
/// Compression pointers are followed at most this many times (§4.7).
const MAX_POINTER_JUMPS: u32 = 10;

const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;

struct Slot {
	id: u16,
	result: Option<Ipv4Addr>,
}

/// The client's mutable state: the next query id and the single pending-query
/// slot (§3 "DNS pending query"), shared with the UDP response handler
/// through an [`Arc`] since the handler cannot borrow the [`Stack`] that owns
/// it.
pub struct State {
	next_id: u16,
	bound: bool,
	slot: Arc<Mutex<Slot>>,
}

impl State {
	pub fn new() -> Self {
		Self {
			next_id: 1,
			bound: false,
			slot: Arc::new(Mutex::new(Slot { id: 0, result: None })),
		}
	}
}

impl Default for State {
	fn default() -> Self {
		Self::new()
	}
}

fn encode_name(name: &str, out: &mut Vec<u8>) {
	for label in name.split('.') {
		out.push(label.len() as u8);
		out.extend_from_slice(label.as_bytes());
	}
	out.push(0);
}

/// Reads a (possibly compressed) name starting at `pos`, returning the name
/// and the offset just past its on-the-wire encoding (pointer jumps do not
/// advance this).
fn decode_name(packet: &[u8], mut pos: usize) -> Option<(String, usize)> {
	let mut name = String::new();
	let mut jumps = 0u32;
	let mut end_pos = None;
	loop {
		let len = *packet.get(pos)?;
		if len == 0 {
			if end_pos.is_none() {
				end_pos = Some(pos + 1);
			}
			break;
		}
		if len & 0xc0 == 0xc0 {
			if jumps >= MAX_POINTER_JUMPS {
				return None;
			}
			jumps += 1;
			let lo = *packet.get(pos + 1)?;
			if end_pos.is_none() {
				end_pos = Some(pos + 2);
			}
			pos = (((len & 0x3f) as usize) << 8) | lo as usize;
			continue;
		}
		let start = pos + 1;
		let label = packet.get(start..start + len as usize)?;
		if !name.is_empty() {
			name.push('.');
		}
		name.push_str(core::str::from_utf8(label).ok()?);
		pos = start + len as usize;
	}
	Some((name, end_pos?))
}

/// Parses a response message, returning `(query id, first A record found)`.
fn parse_response(packet: &[u8]) -> Option<(u16, Ipv4Addr)> {
	if packet.len() < 12 {
		return None;
	}
	let id = u16::from_be_bytes([packet[0], packet[1]]);
	let qdcount = u16::from_be_bytes([packet[4], packet[5]]) as usize;
	let ancount = u16::from_be_bytes([packet[6], packet[7]]) as usize;

	let mut pos = 12;
	for _ in 0..qdcount {
		let (_, next) = decode_name(packet, pos)?;
		pos = next + 4; // qtype + qclass
	}
	for _ in 0..ancount {
		let (_, next) = decode_name(packet, pos)?;
		pos = next;
		let rtype = u16::from_be_bytes([*packet.get(pos)?, *packet.get(pos + 1)?]);
		let rclass = u16::from_be_bytes([*packet.get(pos + 2)?, *packet.get(pos + 3)?]);
		let rdlength = u16::from_be_bytes([*packet.get(pos + 8)?, *packet.get(pos + 9)?]) as usize;
		let rdata_start = pos + 10;
		if rtype == TYPE_A && rclass == CLASS_IN && rdlength == 4 {
			let ip = packet.get(rdata_start..rdata_start + 4)?;
			return Some((id, [ip[0], ip[1], ip[2], ip[3]]));
		}
		pos = rdata_start + rdlength;
	}
	None
}

/// Blocks (by polling the stack) until `name` resolves to an A record, 5 s
/// elapse, or sending the query fails.
///
/// Returns `0.0.0.0` on any failure, per §4.7/§7.
pub fn resolve(stack: &mut Stack, server: Ipv4Addr, name: &str) -> Ipv4Addr {
	match resolve_inner(stack, server, name) {
		Ok(ip) => ip,
		Err(e) => {
			log!("dns", "resolve({name}) failed: {e}");
			super::UNSPECIFIED_ADDR
		}
	}
}

fn resolve_inner(stack: &mut Stack, server: Ipv4Addr, name: &str) -> EResult<Ipv4Addr> {
	if !stack.dns.bound {
		let slot = stack.dns.slot.clone();
		stack.bind_udp(CLIENT_PORT, move |_src, _port, payload| {
			if let Some((resp_id, ip)) = parse_response(payload) {
				let mut s = slot.lock();
				if s.id == resp_id {
					s.result = Some(ip);
				}
			}
		});
		stack.dns.bound = true;
	}

	let id = stack.dns.next_id;
	stack.dns.next_id = stack.dns.next_id.wrapping_add(1);
	*stack.dns.slot.lock() = Slot { id, result: None };

	let mut query = Vec::new();
	query.extend_from_slice(&id.to_be_bytes());
	query.extend_from_slice(&0x0100u16.to_be_bytes()); // recursion desired
	query.extend_from_slice(&1u16.to_be_bytes()); // qdcount
	query.extend_from_slice(&0u16.to_be_bytes());
	query.extend_from_slice(&0u16.to_be_bytes());
	query.extend_from_slice(&0u16.to_be_bytes());
	encode_name(name, &mut query);
	query.extend_from_slice(&TYPE_A.to_be_bytes());
	query.extend_from_slice(&CLASS_IN.to_be_bytes());

	udp::send(stack, server, CLIENT_PORT, QUERY_PORT, &query)?;

	let deadline = time::uptime_ms() + TIMEOUT_MS;
	let mut next_poll = time::uptime_ms();
	let mut next_log = time::uptime_ms() + PROGRESS_LOG_MS;
	loop {
		let now = time::uptime_ms();
		if now >= deadline {
			break;
		}
		if now >= next_poll {
			stack.poll();
			next_poll = now + POLL_INTERVAL_MS;
			let found = {
				let s = stack.dns.slot.lock();
				(s.id == id).then_some(s.result).flatten()
			};
			if let Some(ip) = found {
				return Ok(ip);
			}
		}
		if now >= next_log {
			log!("dns", "waiting for {name}...");
			next_log = now + PROGRESS_LOG_MS;
		}
		core::hint::spin_loop();
	}
	Err(errno::Errno::ETIMEDOUT)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_case]
	fn name_round_trip_no_compression() {
		let mut buf = Vec::new();
		encode_name("example.com", &mut buf);
		let (name, end) = decode_name(&buf, 0).unwrap();
		assert_eq!(name, "example.com");
		assert_eq!(end, buf.len());
	}

	#[test_case]
	fn name_with_compression_pointer() {
		let mut packet = Vec::new();
		packet.extend_from_slice(&[0u8; 12]);
		let base = packet.len();
		encode_name("example.com", &mut packet);
		// A second name that points back at the first.
		packet.push(0xc0);
		packet.push(base as u8);
		let (name, _) = decode_name(&packet, packet.len() - 2).unwrap();
		assert_eq!(name, "example.com");
	}

	#[test_case]
	fn response_parse_finds_a_record() {
		let mut packet = Vec::new();
		packet.extend_from_slice(&0x1234u16.to_be_bytes()); // id
		packet.extend_from_slice(&0x8180u16.to_be_bytes()); // flags
		packet.extend_from_slice(&1u16.to_be_bytes()); // qdcount
		packet.extend_from_slice(&1u16.to_be_bytes()); // ancount
		packet.extend_from_slice(&0u16.to_be_bytes());
		packet.extend_from_slice(&0u16.to_be_bytes());
		encode_name("example.com", &mut packet);
		packet.extend_from_slice(&TYPE_A.to_be_bytes());
		packet.extend_from_slice(&CLASS_IN.to_be_bytes());
		// Answer, using a compression pointer back to the question name.
		packet.push(0xc0);
		packet.push(12);
		packet.extend_from_slice(&TYPE_A.to_be_bytes());
		packet.extend_from_slice(&CLASS_IN.to_be_bytes());
		packet.extend_from_slice(&300u32.to_be_bytes()); // ttl
		packet.extend_from_slice(&4u16.to_be_bytes()); // rdlength
		packet.extend_from_slice(&[93, 184, 216, 34]);

		let (id, ip) = parse_response(&packet).unwrap();
		assert_eq!(id, 0x1234);
		assert_eq!(ip, [93, 184, 216, 34]);
	}
}
