//! Shared memory: 64 KiB of RAM addressed by both the coprocessor and the
//! DSP, with the boot ROM overlay at the top.
//!
//! No component owns this memory exclusively. The DSP reads sample data and
//! reads/writes the echo ring buffer through plain offset-based access, which
//! means echo writes can clobber the mapped boot ROM copy exactly like on
//! hardware.

/// Size of the shared memory space.
pub const MEMORY_SIZE: usize = 0x10000;

/// Size of the boot ROM overlay.
pub const ROM_SIZE: usize = 0x40;

/// Address at which the boot ROM is mapped while enabled.
pub const ROM_ADDR: u16 = 0xFFC0;

/// The 64-byte IPL boot ROM. Mapped at [`ROM_ADDR`] while bit 7 of the
/// coprocessor CONTROL register is set.
const IPL_ROM: [u8; ROM_SIZE] = [
	0xCD, 0xEF, 0xBD, 0xE8, 0x00, 0xC6, 0x1D, 0xD0, 0xFC, 0x8F, 0xAA, 0xF4, 0x8F, 0xBB, 0xF5, 0x78,
	0xCC, 0xF4, 0xD0, 0xFB, 0x2F, 0x19, 0xEB, 0xF4, 0xD0, 0xFC, 0x7E, 0xF4, 0xD0, 0x0B, 0xE4, 0xF5,
	0xCB, 0xF4, 0xD7, 0x00, 0xFC, 0xD0, 0xF3, 0xAB, 0x01, 0x10, 0xEF, 0x7E, 0xF4, 0x10, 0xEB, 0xBA,
	0xF6, 0xDA, 0x00, 0xBA, 0xF4, 0xC4, 0xF4, 0xDD, 0x5D, 0xD0, 0xDB, 0x1F, 0x00, 0x00, 0xC0, 0xFF,
];

/// Shared coprocessor/DSP memory.
pub struct Memory {
	/// The flat memory image. While the boot ROM is enabled its bytes are
	/// copied in at [`ROM_ADDR`]; the RAM underneath is parked in `hi_ram`.
	pub(crate) ram:         [u8; MEMORY_SIZE],
	/// RAM contents hidden under the boot ROM overlay while it is mapped.
	pub(crate) hi_ram:      [u8; ROM_SIZE],
	/// Whether the boot ROM overlay is currently mapped.
	pub(crate) rom_enabled: bool,
}

impl Default for Memory {
	fn default() -> Self {
		Self::new()
	}
}

impl Memory {
	/// Creates zeroed memory with the boot ROM unmapped.
	#[must_use]
	pub fn new() -> Self {
		Self { ram: [0; MEMORY_SIZE], hi_ram: [0; ROM_SIZE], rom_enabled: false }
	}

	/// Raw read as performed by the DSP; the overlay, if mapped, is read
	/// through like regular memory.
	#[inline]
	#[must_use]
	pub fn read(&self, address: u16) -> u8 {
		self.ram[address as usize]
	}

	/// 16-bit little-endian read with address wraparound.
	#[inline]
	#[must_use]
	pub fn read_word(&self, address: u16) -> u16 {
		u16::from(self.read(address)) | (u16::from(self.read(address.wrapping_add(1))) << 8)
	}

	/// Raw write as performed by the DSP echo unit. Deliberately ignores the
	/// overlay; hardware lets echo writes overwrite the mapped ROM copy.
	#[inline]
	pub fn write(&mut self, address: u16, value: u8) {
		self.ram[address as usize] = value;
	}

	/// Write from the coprocessor bus into the top 64 bytes. While the ROM is
	/// mapped the value lands in the shadow and the visible ROM byte stays.
	pub(crate) fn write_high(&mut self, address: u16, value: u8) {
		let index = (address - ROM_ADDR) as usize;
		self.hi_ram[index] = value;
		if !self.rom_enabled {
			self.ram[address as usize] = value;
		}
	}

	/// Maps or unmaps the boot ROM overlay, preserving the RAM underneath.
	pub(crate) fn set_rom_enabled(&mut self, enable: bool) {
		if self.rom_enabled == enable {
			return;
		}
		self.rom_enabled = enable;
		let high = ROM_ADDR as usize ..;
		if enable {
			self.hi_ram.copy_from_slice(&self.ram[high.clone()]);
			self.ram[high].copy_from_slice(&IPL_ROM);
		} else {
			self.ram[high].copy_from_slice(&self.hi_ram);
		}
		trace!("boot ROM overlay {}", if enable { "mapped" } else { "unmapped" });
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rom_overlay_preserves_ram_underneath() {
		let mut memory = Memory::new();
		memory.write(0xFFC0, 0x42);
		memory.set_rom_enabled(true);
		assert_eq!(memory.read(0xFFC0), IPL_ROM[0]);
		// Bus writes while mapped land in the shadow.
		memory.write_high(0xFFC1, 0x99);
		assert_eq!(memory.read(0xFFC1), IPL_ROM[1]);
		memory.set_rom_enabled(false);
		assert_eq!(memory.read(0xFFC0), 0x42);
		assert_eq!(memory.read(0xFFC1), 0x99);
	}
}
