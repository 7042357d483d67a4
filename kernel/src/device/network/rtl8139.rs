//! RTL8139-equivalent Ethernet driver (§4.3).
//!
//! Register layout and reset sequence are grounded in the classic RTL8139
//! programming model (vendor 0x10ec, device 0x8139); this rewrite keeps the
//! four-descriptor round-robin transmit ring and the single wrap-around
//! receive ring, but drives them through the `io`/`pci` ports instead of a
//! `smoltcp` device adapter.

use crate::device::bus::pci::{self, PciDevice};
use crate::device::network::{Flags, FrameDevice, MacAddr};
use crate::io;
use crate::log;
use core::sync::atomic::{AtomicUsize, Ordering};
use utils::collections::vec::Vec;
use utils::{errno, errno::EResult};

const VENDOR_REALTEK: u16 = 0x10ec;
const DEVICE_RTL8139: u16 = 0x8139;

const REG_IDR0: u16 = 0x00;
const REG_TSAD0: u16 = 0x20;
const REG_TSD0: u16 = 0x10;
const REG_RBSTART: u16 = 0x30;
const REG_CR: u16 = 0x37;
const REG_CAPR: u16 = 0x38;
const REG_IMR: u16 = 0x3c;
const REG_ISR: u16 = 0x3e;
const REG_TCR: u16 = 0x40;
const REG_RCR: u16 = 0x44;
const REG_CR9346: u16 = 0x50;
const REG_CONFIG1: u16 = 0x52;

const CR_RST: u8 = 0x10;
const CR_RE: u8 = 0x08;
const CR_TE: u8 = 0x04;
const CR_BUFE: u8 = 0x01;

const ISR_ROK: u16 = 0x01;
const ISR_RER: u16 = 0x02;
const ISR_TOK: u16 = 0x04;
const ISR_TER: u16 = 0x08;
const ISR_RXOVW: u16 = 0x10;
const INT_MASK: u16 = ISR_ROK | ISR_TOK | ISR_RXOVW | ISR_TER | ISR_RER;

const TSD_OWN: u32 = 1 << 13;
const TSD_TOK: u32 = 1 << 15;
const TSD_TUN: u32 = 1 << 14;
const TSD_TABT: u32 = 1 << 30;
const TSD_OWC: u32 = 1 << 29;

const RCR_AAP: u32 = 0x01;
const RCR_APM: u32 = 0x02;
const RCR_AM: u32 = 0x04;
const RCR_AB: u32 = 0x08;
const RCR_WRAP: u32 = 0x80;
const RCR_MXDMA_UNLIMITED: u32 = 0x700;
const RCR_RBLEN_8K: u32 = 0x00;

const TX_BUFFERS: usize = 4;
/// Capacity of one transmit descriptor's buffer; large enough for one MTU
/// plus the Ethernet header.
const TX_BUF_LEN: usize = 1792;
/// Receive ring capacity: 8 KiB plus the 16-byte margin and one-MTU pad the
/// hardware requires so it never has to split a packet at the ring end.
const RX_BUF_LEN: usize = 8192 + 16 + 1500;

/// A receive/transmit ring member allocated as plain heap memory.
///
/// The kernel has no paging (§1 Non-goals), so every address is already a
/// physical one; a real deployment with an IOMMU-less x86-64 boot in this
/// configuration must keep the heap inside the first 4 GiB so these
/// addresses fit in the card's 32-bit DMA registers (§4.3 "32-bit physical
/// range").
struct DmaBuffer(Vec<u8>);

impl DmaBuffer {
	fn new(len: usize) -> Self {
		let mut v = Vec::new();
		v.resize(len, 0u8);
		Self(v)
	}

	fn phys_addr(&self) -> EResult<u32> {
		let addr = self.0.as_ptr() as usize;
		u32::try_from(addr).map_err(|_| errno!(EINVAL))
	}
}

struct TxDescriptor {
	buf: DmaBuffer,
	/// Driver-tracked ownership shadow: `true` while hardware DMA is
	/// believed in flight (§3 TX descriptor invariant).
	owner: bool,
}

/// The driver for one RTL8139-equivalent network controller.
pub struct Rtl8139 {
	io_base: u16,
	mac: MacAddr,
	rx: DmaBuffer,
	/// Driver's read offset into the RX ring (mutated only by the driver,
	/// §5 Shared-resource policy).
	rx_offset: usize,
	tx: [TxDescriptor; TX_BUFFERS],
	tx_next: usize,
	/// Visible to both interrupt and polling context without further
	/// locking (§5): a plain atomic counter of descriptors believed busy.
	tx_in_flight: AtomicUsize,
}

impl Rtl8139 {
	/// Discovers and initializes the first RTL8139-equivalent controller on
	/// the PCI bus.
	pub fn probe() -> EResult<Self> {
		let devices = pci::scan();
		let dev = pci::find(&devices, VENDOR_REALTEK, DEVICE_RTL8139).ok_or(errno!(ENOENT))?;
		Self::init(dev)
	}

	fn init(dev: PciDevice) -> EResult<Self> {
		dev.enable_bus_mastering();
		let io_base = dev.io_bar(0).ok_or(errno!(EINVAL))?;

		let mac = unsafe {
			[
				io::inb(io_base + REG_IDR0),
				io::inb(io_base + REG_IDR0 + 1),
				io::inb(io_base + REG_IDR0 + 2),
				io::inb(io_base + REG_IDR0 + 3),
				io::inb(io_base + REG_IDR0 + 4),
				io::inb(io_base + REG_IDR0 + 5),
			]
		};

		unsafe {
			// Software reset; spin until the hardware clears RST.
			io::outb(io_base + REG_CR, CR_RST);
			let mut tries = 1_000_000u32;
			while io::inb(io_base + REG_CR) & CR_RST != 0 && tries > 0 {
				tries -= 1;
			}
			if tries == 0 {
				log!("rtl8139", "reset failed");
				return Err(errno!(ETIMEDOUT));
			}

			// Unlock config registers, clear CONFIG1, re-lock.
			io::outb(io_base + REG_CR9346, 0xc0);
			io::outb(io_base + REG_CONFIG1, 0);
			io::outb(io_base + REG_CR9346, 0);
		}

		let rx = DmaBuffer::new(RX_BUF_LEN);
		let tx = [
			TxDescriptor {
				buf: DmaBuffer::new(TX_BUF_LEN),
				owner: false,
			},
			TxDescriptor {
				buf: DmaBuffer::new(TX_BUF_LEN),
				owner: false,
			},
			TxDescriptor {
				buf: DmaBuffer::new(TX_BUF_LEN),
				owner: false,
			},
			TxDescriptor {
				buf: DmaBuffer::new(TX_BUF_LEN),
				owner: false,
			},
		];

		unsafe {
			io::outl(io_base + REG_RBSTART, rx.phys_addr()?);
			for (i, desc) in tx.iter().enumerate() {
				io::outl(io_base + REG_TSAD0 + (i as u16 * 4), desc.buf.phys_addr()?);
			}
			io::outl(
				io_base + REG_RCR,
				RCR_MXDMA_UNLIMITED | RCR_RBLEN_8K | RCR_WRAP | RCR_AB | RCR_AM | RCR_APM | RCR_AAP,
			);
			io::outl(io_base + REG_TCR, 0);
			io::outw(io_base + REG_IMR, INT_MASK);
			io::outb(io_base + REG_CR, CR_TE | CR_RE);
		}

		log!(
			"rtl8139",
			"mac {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x} io_base 0x{io_base:x}",
			mac[0],
			mac[1],
			mac[2],
			mac[3],
			mac[4],
			mac[5]
		);

		Ok(Self {
			io_base,
			mac,
			rx,
			rx_offset: 0,
			tx,
			tx_next: 0,
			tx_in_flight: AtomicUsize::new(0),
		})
	}

	/// Scans all four descriptors for a hardware-reported completion
	/// (interrupt handler and polling loop both call this, §4.3/§9).
	fn reap_tx_completions(&mut self) {
		for (i, desc) in self.tx.iter_mut().enumerate() {
			if !desc.owner {
				continue;
			}
			let status = unsafe { io::inl(self.io_base + REG_TSD0 + i as u16 * 4) };
			if status & (TSD_TABT | TSD_OWC) != 0 {
				log!("rtl8139", "tx descriptor {i} major error");
				desc.owner = false;
				self.tx_in_flight.fetch_sub(1, Ordering::Relaxed);
				continue;
			}
			if status & TSD_TUN != 0 {
				log!("rtl8139", "tx descriptor {i} underrun");
			}
			if status & TSD_TOK != 0 {
				desc.owner = false;
				self.tx_in_flight.fetch_sub(1, Ordering::Relaxed);
			}
		}
	}

	/// Processes every frame between the hardware write pointer and the
	/// driver's read offset, in ring order (§4.3 Receive model).
	fn drain_rx(&mut self, on_receive: &mut dyn FnMut(&[u8])) {
		while unsafe { io::inb(self.io_base + REG_CR) } & CR_BUFE == 0 {
			let header_off = self.rx_offset % (RX_BUF_LEN - 16 - 1500);
			if header_off + 4 > self.rx.0.len() {
				break;
			}
			let status = u16::from_le_bytes([self.rx.0[header_off], self.rx.0[header_off + 1]]);
			let length = u16::from_le_bytes([self.rx.0[header_off + 2], self.rx.0[header_off + 3]]) as usize;
			const RX_OK: u16 = 0x01;
			if status & RX_OK == 0 {
				log!("rtl8139", "rx status 0x{status:x}, dropping");
				self.rx_offset = (self.rx_offset + 4) % RX_BUF_LEN;
				continue;
			}
			if length < 4 || header_off + 4 + length > self.rx.0.len() {
				log!("rtl8139", "malformed rx length {length}");
				break;
			}
			// `length` includes the trailing 4-byte CRC the hardware
			// reports; the frame itself is `length - 4` bytes.
			let frame_len = length.saturating_sub(4);
			let frame = &self.rx.0[header_off + 4..header_off + 4 + frame_len];
			on_receive(frame);
			// Advance past header + frame + CRC, aligned up to 4 bytes.
			let consumed = (4 + length + 3) & !3;
			self.rx_offset = (self.rx_offset + consumed) % RX_BUF_LEN;
			unsafe {
				io::outw(self.io_base + REG_CAPR, (self.rx_offset as u16).wrapping_sub(0x10));
			}
		}
	}

	/// Acknowledges and logs whatever the interrupt status register reports
	/// (errors only; ROK/TOK are handled by [`Self::poll`]).
	pub fn handle_interrupt(&mut self) {
		let isr = unsafe { io::inw(self.io_base + REG_ISR) };
		if isr & ISR_RER != 0 {
			log!("rtl8139", "rx error");
		}
		if isr & ISR_TER != 0 {
			log!("rtl8139", "tx error");
		}
		if isr & ISR_RXOVW != 0 {
			log!("rtl8139", "rx overflow");
		}
		unsafe { io::outw(self.io_base + REG_ISR, isr) };
	}
}

impl FrameDevice for Rtl8139 {
	fn mac(&self) -> MacAddr {
		self.mac
	}

	fn mtu(&self) -> usize {
		1500
	}

	fn flags(&self) -> Flags {
		Flags::UP | Flags::BROADCAST | Flags::RUNNING
	}

	fn send(&mut self, ethertype: u16, dst_mac: MacAddr, payload: &[u8]) -> EResult<()> {
		self.reap_tx_completions();
		let total_len = 14 + payload.len();
		if total_len > TX_BUF_LEN {
			return Err(errno!(EINVAL));
		}
		let idx = (0..TX_BUFFERS)
			.map(|off| (self.tx_next + off) % TX_BUFFERS)
			.find(|&i| !self.tx[i].owner)
			.ok_or(errno!(EBUSY))?;
		self.tx_next = (idx + 1) % TX_BUFFERS;

		let desc = &mut self.tx[idx];
		desc.buf.0[0..6].copy_from_slice(&dst_mac);
		desc.buf.0[6..12].copy_from_slice(&self.mac);
		desc.buf.0[12..14].copy_from_slice(&ethertype.to_be_bytes());
		desc.buf.0[14..14 + payload.len()].copy_from_slice(payload);
		// Ensure the buffer write is visible before the card is told to
		// start DMA (§5 Ordering guarantees).
		core::sync::atomic::fence(Ordering::SeqCst);
		desc.owner = true;
		self.tx_in_flight.fetch_add(1, Ordering::Relaxed);
		unsafe {
			io::outl(self.io_base + REG_TSD0 + idx as u16 * 4, total_len as u32 & !TSD_OWN);
		}
		Ok(())
	}

	fn poll(&mut self, on_receive: &mut dyn FnMut(&[u8])) {
		self.reap_tx_completions();
		self.drain_rx(on_receive);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_case]
	fn dma_buffer_address_fits_descriptor() {
		let buf = DmaBuffer::new(TX_BUF_LEN);
		assert!(buf.phys_addr().is_ok());
	}
}
