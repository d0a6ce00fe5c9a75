//! The DSP's 128-byte register file and the addresses within it.
//!
//! The register space interleaves per-voice registers (low nibble 0..=9 of
//! addresses `$V0..$V9` for voice V in the high nibble) with global registers
//! in the remaining slots. Only the low 7 bits of the externally supplied
//! address select a register; bit 7 is ignored on both reads and writes.

use bitflags::bitflags;

/// Number of addressable DSP registers.
pub const REGISTER_COUNT: usize = 128;

/// Number of voices.
pub const VOICE_COUNT: usize = 8;

/// Stride between consecutive voices' register banks.
pub const VOICE_REGISTER_STRIDE: usize = 0x10;

/// Global register addresses.
pub mod global {
	/// Main volume, left.
	pub const MVOLL: usize = 0x0C;
	/// Main volume, right.
	pub const MVOLR: usize = 0x1C;
	/// Echo volume, left.
	pub const EVOLL: usize = 0x2C;
	/// Echo volume, right.
	pub const EVOLR: usize = 0x3C;
	/// Key-on bits, one per voice.
	pub const KON: usize = 0x4C;
	/// Key-off bits, one per voice.
	pub const KOFF: usize = 0x5C;
	/// Control flags and noise rate; see [`super::DspFlags`].
	pub const FLG: usize = 0x6C;
	/// Per-voice sample-end status bits; sticky until written.
	pub const ENDX: usize = 0x7C;
	/// Echo feedback volume.
	pub const EFB: usize = 0x0D;
	/// Pitch modulation enable bits.
	pub const PMON: usize = 0x2D;
	/// Noise substitution enable bits.
	pub const NON: usize = 0x3D;
	/// Echo routing enable bits.
	pub const EON: usize = 0x4D;
	/// Sample directory page.
	pub const DIR: usize = 0x5D;
	/// Echo ring buffer page.
	pub const ESA: usize = 0x6D;
	/// Echo delay (ring buffer length), low nibble.
	pub const EDL: usize = 0x7D;
	/// First FIR filter coefficient; the other seven sit 0x10 apart.
	pub const FIR: usize = 0x0F;
}

/// Per-voice register offsets within a voice's bank.
pub mod voice {
	/// Voice volume, left.
	pub const VOLL: usize = 0x0;
	/// Voice volume, right.
	pub const VOLR: usize = 0x1;
	/// Sample pitch, low byte.
	pub const PITCHL: usize = 0x2;
	/// Sample pitch, high 6 bits.
	pub const PITCHH: usize = 0x3;
	/// Source (sample directory entry) number.
	pub const SRCN: usize = 0x4;
	/// First envelope control byte.
	pub const ADSR0: usize = 0x5;
	/// Second envelope control byte.
	pub const ADSR1: usize = 0x6;
	/// Gain envelope control byte.
	pub const GAIN: usize = 0x7;
	/// Current envelope level readback (top 7 bits).
	pub const ENVX: usize = 0x8;
	/// Current waveform output readback (top 8 bits).
	pub const OUTX: usize = 0x9;
}

bitflags! {
	/// The global FLG register. The low five bits are the noise generator
	/// rate, not individual flags.
	#[repr(transparent)]
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub struct DspFlags: u8 {
		/// Soft reset: forces every voice keyed off with a zeroed envelope.
		const SOFT_RESET   = 0b1000_0000;
		/// Mutes the final output stage.
		const MUTE         = 0b0100_0000;
		/// Disables writes to the echo ring buffer (reads continue).
		const ECHO_WRITES_DISABLED = 0b0010_0000;
		const _            = 0b0001_1111;
	}
}

impl DspFlags {
	/// The noise generator's update rate, an index into the rate table.
	#[must_use]
	pub const fn noise_rate(self) -> usize {
		(self.bits() & 0x1F) as usize
	}
}

/// The DSP register file. Plain bytes; all interpretation happens in the
/// sample pipeline, which also maintains the ENVX/OUTX/ENDX readback values
/// in here.
#[derive(Clone)]
pub struct DspRegisters {
	pub(crate) values: [u8; REGISTER_COUNT],
}

impl Default for DspRegisters {
	fn default() -> Self {
		Self { values: [0; REGISTER_COUNT] }
	}
}

impl DspRegisters {
	/// Reads a register. `address` may carry bit 7; it is ignored.
	#[inline]
	#[must_use]
	pub fn read(&self, address: u8) -> u8 {
		self.values[(address & 0x7F) as usize]
	}

	/// Writes a register. `address` may carry bit 7; it is ignored, so the
	/// upper half of the address space aliases the lower.
	#[inline]
	pub fn write(&mut self, address: u8, value: u8) {
		self.values[(address & 0x7F) as usize] = value;
	}

	/// Reads a per-voice register.
	#[inline]
	#[must_use]
	pub fn voice(&self, voice: usize, offset: usize) -> u8 {
		self.values[voice * VOICE_REGISTER_STRIDE + offset]
	}

	/// Writes a per-voice register (used for the ENVX/OUTX readbacks).
	#[inline]
	pub fn set_voice(&mut self, voice: usize, offset: usize, value: u8) {
		self.values[voice * VOICE_REGISTER_STRIDE + offset] = value;
	}

	/// The global FLG register, typed.
	#[inline]
	#[must_use]
	pub fn flags(&self) -> DspFlags {
		DspFlags::from_bits_retain(self.values[global::FLG])
	}

	/// The `index`th FIR filter coefficient (0..8).
	#[inline]
	#[must_use]
	pub fn fir(&self, index: usize) -> u8 {
		self.values[global::FIR + index * VOICE_REGISTER_STRIDE]
	}
}
