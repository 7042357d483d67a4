//! PCI (Peripheral Component Interconnect) configuration space access.
//!
//! The network controller's discovery phase is: scan the bus for a
//! vendor/device pair, read BAR0 as an I/O base, enable I/O decode and
//! bus-master in the command register (§4.3).

use crate::io;
use core::mem::size_of;
use utils::collections::vec::Vec;

const CONFIG_ADDRESS_PORT: u16 = 0xcf8;
const CONFIG_DATA_PORT: u16 = 0xcfc;

/// Command register bit: enable I/O space decoding.
pub const COMMAND_IO_SPACE: u16 = 1 << 0;
/// Command register bit: enable memory space decoding.
pub const COMMAND_MEMORY_SPACE: u16 = 1 << 1;
/// Command register bit: enable the device as a bus master (DMA).
pub const COMMAND_BUS_MASTER: u16 = 1 << 2;

fn read_long(bus: u8, device: u8, func: u8, reg_off: u8) -> u32 {
	let addr = ((bus as u32) << 16)
		| ((device as u32) << 11)
		| ((func as u32) << 8)
		| ((reg_off as u32 * size_of::<u32>() as u32) & 0xfc)
		| 0x8000_0000;
	unsafe {
		io::outl(CONFIG_ADDRESS_PORT, addr);
		io::inl(CONFIG_DATA_PORT)
	}
}

fn write_long(bus: u8, device: u8, func: u8, reg_off: u8, value: u32) {
	let addr = ((bus as u32) << 16)
		| ((device as u32) << 11)
		| ((func as u32) << 8)
		| ((reg_off as u32 * size_of::<u32>() as u32) & 0xfc)
		| 0x8000_0000;
	unsafe {
		io::outl(CONFIG_ADDRESS_PORT, addr);
		io::outl(CONFIG_DATA_PORT, value);
	}
}

/// A device found on the PCI bus.
#[derive(Debug, Clone, Copy)]
pub struct PciDevice {
	pub bus: u8,
	pub device: u8,
	pub function: u8,
	pub vendor_id: u16,
	pub device_id: u16,
	pub class: u8,
	pub subclass: u8,
}

impl PciDevice {
	/// Reads configuration register `reg_off` (as a 32-bit word index).
	pub fn read(&self, reg_off: u8) -> u32 {
		read_long(self.bus, self.device, self.function, reg_off)
	}

	/// Writes configuration register `reg_off`.
	pub fn write(&self, reg_off: u8, value: u32) {
		write_long(self.bus, self.device, self.function, reg_off, value);
	}

	/// Reads BAR `n` (0-5) and, if it is an I/O-space BAR, returns its port
	/// base address with the low indicator bit masked off.
	pub fn io_bar(&self, n: u8) -> Option<u16> {
		let value = self.read(4 + n);
		if value & 0b1 == 0 {
			return None;
		}
		Some((value & 0xffff_fffc) as u16)
	}

	/// Enables I/O space, memory space, and bus mastering in the command
	/// register.
	pub fn enable_bus_mastering(&self) {
		let mut data = self.read(1);
		data |= (COMMAND_IO_SPACE | COMMAND_MEMORY_SPACE | COMMAND_BUS_MASTER) as u32;
		self.write(1, data);
	}
}

/// Scans every bus/device/function and returns the devices found.
pub fn scan() -> Vec<PciDevice> {
	let mut devices = Vec::new();
	for bus in 0..=255u8 {
		for device in 0..32u8 {
			let id = read_long(bus, device, 0, 0);
			let vendor_id = (id & 0xffff) as u16;
			if vendor_id == 0xffff {
				continue;
			}
			let header = read_long(bus, device, 0, 3);
			let multi_function = header & 0x0080_0000 != 0;
			let max_func = if multi_function { 8 } else { 1 };
			for function in 0..max_func {
				let id = read_long(bus, device, function, 0);
				let vendor_id = (id & 0xffff) as u16;
				if vendor_id == 0xffff {
					continue;
				}
				let device_id = ((id >> 16) & 0xffff) as u16;
				let class_reg = read_long(bus, device, function, 2);
				devices.push(PciDevice {
					bus,
					device,
					function,
					vendor_id,
					device_id,
					class: ((class_reg >> 24) & 0xff) as u8,
					subclass: ((class_reg >> 16) & 0xff) as u8,
				});
			}
		}
	}
	devices
}

/// Finds the first scanned device matching `vendor_id`/`device_id`.
pub fn find(devices: &[PciDevice], vendor_id: u16, device_id: u16) -> Option<PciDevice> {
	devices
		.iter()
		.find(|d| d.vendor_id == vendor_id && d.device_id == device_id)
		.copied()
}
