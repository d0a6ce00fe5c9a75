//! Save states: a fixed-size, versioned binary block holding the complete
//! dynamic state of the device.
//!
//! Serialization is expressed once, as a walk over the device's fields; an
//! encoding or decoding walker makes the same walk either write the block
//! or read it back. Derived state (buffer mirrors, timer deadlines,
//! the latched control flags) is not stored and gets rebuilt after a load,
//! so a loaded device is deterministically identical to the saved one.

use num_traits::FromPrimitive;
use thiserror::Error;

use crate::apu::Apu;
use crate::dsp::echo::ECHO_HIST_SIZE;
use crate::dsp::envelope::EnvelopeMode;
use crate::dsp::registers::VOICE_COUNT;
use crate::dsp::voice::BRR_BUF_SIZE;
use crate::smp::register;
use crate::timing::TIMER_COUNT;

/// Payload size of a state block; sized with headroom so the format can
/// grow without changing the block size.
pub const STATE_SIZE: usize = 68 * 1024;

/// Total size of a state block including the tag.
pub const STATE_BLOCK_SIZE: usize = STATE_SIZE + 8;

/// Identifying tag at the start of every block; the fifth byte is the
/// format version.
const STATE_TAG: [u8; 8] = *b"SAPU\x01\0\0\0";

/// Filler for the unused payload tail.
const PAD: u8 = 0xFF;

/// Why a state block was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateBlockError {
	/// The block is not exactly [`STATE_BLOCK_SIZE`] bytes.
	#[error("state block is {actual} bytes, expected {STATE_BLOCK_SIZE}")]
	WrongLength {
		/// Size of the rejected block.
		actual: usize,
	},
	/// The tag doesn't match, or the format version is unknown.
	#[error("not a recognized state block")]
	TagMismatch,
}

/// Checks that `block` looks like a state block this crate can load.
pub fn validate_block(block: &[u8]) -> Result<(), StateBlockError> {
	if block.len() != STATE_BLOCK_SIZE {
		return Err(StateBlockError::WrongLength { actual: block.len() });
	}
	if block[.. 8] != STATE_TAG {
		return Err(StateBlockError::TagMismatch);
	}
	Ok(())
}

/// Direction-agnostic field visitor. Encoding copies the visited value into
/// the block; decoding overwrites it from the block. Every walk visits the
/// same fields in the same order, which is what keeps the two directions in
/// sync.
trait Walker {
	fn bytes(&mut self, data: &mut [u8]);

	fn walk_u8(&mut self, value: &mut u8) {
		let mut buffer = [*value];
		self.bytes(&mut buffer);
		*value = buffer[0];
	}

	fn walk_bool(&mut self, value: &mut bool) {
		let mut byte = u8::from(*value);
		self.walk_u8(&mut byte);
		*value = byte != 0;
	}

	fn walk_u16(&mut self, value: &mut u16) {
		let mut buffer = value.to_le_bytes();
		self.bytes(&mut buffer);
		*value = u16::from_le_bytes(buffer);
	}

	fn walk_i32(&mut self, value: &mut i32) {
		let mut buffer = value.to_le_bytes();
		self.bytes(&mut buffer);
		*value = i32::from_le_bytes(buffer);
	}
}

struct Encoder<'a> {
	buffer: &'a mut [u8],
	pos:    usize,
}

impl Walker for Encoder<'_> {
	fn bytes(&mut self, data: &mut [u8]) {
		let end = self.pos + data.len();
		self.buffer[self.pos .. end].copy_from_slice(data);
		self.pos = end;
	}
}

struct Decoder<'a> {
	buffer: &'a [u8],
	pos:    usize,
}

impl Walker for Decoder<'_> {
	fn bytes(&mut self, data: &mut [u8]) {
		let end = self.pos + data.len();
		data.copy_from_slice(&self.buffer[self.pos .. end]);
		self.pos = end;
	}
}

impl Apu {
	/// Serializes the complete device into a fresh state block. In-flight
	/// port writes are settled first, so saving is not perfectly
	/// transparent; hosts save at frame boundaries where no write is in
	/// flight.
	pub fn save_state(&mut self) -> Vec<u8> {
		// Timers advance lazily; fold any backlog into their counters so
		// the block holds their state as of `spc_time`.
		self.timers.run_to(self.spc_time);
		self.ports.flush();
		let mut block = vec![PAD; STATE_BLOCK_SIZE];
		block[.. 8].copy_from_slice(&STATE_TAG);
		let mut encoder = Encoder { buffer: &mut block[8 ..], pos: 0 };
		walk_device(self, &mut encoder);
		block
	}

	/// Replaces the complete device state with the contents of `block`.
	/// On error the device is left untouched.
	pub fn load_state(&mut self, block: &[u8]) -> Result<(), StateBlockError> {
		validate_block(block)?;
		let mut decoder = Decoder { buffer: &block[8 ..], pos: 0 };
		walk_device(self, &mut decoder);
		self.fix_up_after_load();
		Ok(())
	}

	/// Rebuilds everything the walk deliberately leaves out.
	fn fix_up_after_load(&mut self) {
		// Buffer mirrors.
		for voice in &mut self.dsp.voices {
			let (first, mirror) = voice.buf.split_at_mut(BRR_BUF_SIZE);
			mirror.copy_from_slice(first);
		}
		let (first, mirror) = self.dsp.echo.hist.split_at_mut(ECHO_HIST_SIZE);
		mirror.copy_from_slice(first);

		// Latched flags recommit from the register file.
		self.dsp.flags = self.dsp.regs.flags();

		// Timer deadlines and prescalers are derived state.
		self.timers.set_tempo(self.timers.tempo);
		self.timers.realign(self.spc_time);
		let control = self.smp.control();
		for (bit, timer) in self.timers.timers.iter_mut().enumerate() {
			timer.enabled = control.bits() & (1 << bit) != 0;
		}

		// No write can be in flight in a freshly loaded device, and queued
		// output belongs to the session that saved, not to us.
		for latch in self.ports.to_smp.iter_mut().chain(self.ports.to_host.iter_mut()) {
			latch.pending = None;
		}
		self.output.clear();
	}
}

/// The single definition of the block layout.
#[allow(clippy::cast_possible_truncation)]
fn walk_device(apu: &mut Apu, w: &mut impl Walker) {
	// DSP register file.
	w.bytes(&mut apu.dsp.regs.values);

	// Echo unit.
	let mut hist_pos = apu.dsp.echo.hist_pos as u8;
	w.walk_u8(&mut hist_pos);
	apu.dsp.echo.hist_pos = hist_pos as usize % ECHO_HIST_SIZE;
	for slot in 0 .. ECHO_HIST_SIZE {
		w.walk_i32(&mut apu.dsp.echo.hist[slot][0]);
		w.walk_i32(&mut apu.dsp.echo.hist[slot][1]);
	}
	w.walk_i32(&mut apu.dsp.echo.offset);
	w.walk_i32(&mut apu.dsp.echo.length);

	// DSP globals.
	w.walk_i32(&mut apu.dsp.counter);
	w.walk_i32(&mut apu.dsp.noise);
	w.walk_u8(&mut apu.dsp.kon);
	w.walk_u8(&mut apu.dsp.new_kon);
	w.walk_u8(&mut apu.dsp.koff);
	w.walk_bool(&mut apu.dsp.every_other_sample);

	// Voices.
	for index in 0 .. VOICE_COUNT {
		let voice = &mut apu.dsp.voices[index];
		for sample in 0 .. BRR_BUF_SIZE {
			w.walk_i32(&mut voice.buf[sample]);
		}
		let mut buf_pos = voice.buf_pos as u8;
		w.walk_u8(&mut buf_pos);
		// Group-aligned, or history reads would run off the mirror.
		voice.buf_pos = buf_pos as usize % BRR_BUF_SIZE & !3;
		w.walk_i32(&mut voice.interp_pos);
		w.walk_u16(&mut voice.brr_addr);
		w.walk_u16(&mut voice.brr_offset);
		let mut kon_delay = voice.kon_delay as u8;
		w.walk_u8(&mut kon_delay);
		voice.kon_delay = i32::from(kon_delay.min(5));
		w.walk_i32(&mut voice.envelope.level);
		w.walk_i32(&mut voice.envelope.hidden_level);
		let mut mode = voice.envelope.mode as u8;
		w.walk_u8(&mut mode);
		voice.envelope.mode = EnvelopeMode::from_u8(mode & 3).unwrap_or_default();
		w.walk_u8(&mut voice.envx_out);
	}

	// Device timing.
	w.walk_i32(&mut apu.spc_time);
	w.walk_i32(&mut apu.dsp_time);
	w.walk_i32(&mut apu.timers.tempo);

	// Coprocessor CPU registers.
	w.walk_u16(&mut apu.smp.cpu.pc);
	w.walk_u8(&mut apu.smp.cpu.a);
	w.walk_u8(&mut apu.smp.cpu.x);
	w.walk_u8(&mut apu.smp.cpu.y);
	w.walk_u8(&mut apu.smp.cpu.sp);
	w.walk_u8(&mut apu.smp.cpu.psw);

	// Peripheral registers: the outbound bank is what the coprocessor
	// wrote, the inbound bank is what it would currently read.
	let mut bank_out = apu.smp.regs;
	let mut bank_in = bank_out;
	for port in 0 .. 4 {
		bank_in[register::CPUIO0 + port] = apu.ports.to_smp[port].value;
	}
	for index in 0 .. TIMER_COUNT {
		bank_in[register::T0OUT + index] = apu.timers.timers[index].counter;
	}
	w.bytes(&mut bank_out);
	w.bytes(&mut bank_in);
	apu.smp.regs = bank_out;
	for port in 0 .. 4 {
		apu.ports.to_smp[port].value = bank_in[register::CPUIO0 + port];
		apu.ports.to_host[port].value = bank_out[register::CPUIO0 + port];
	}
	for index in 0 .. TIMER_COUNT {
		let timer = &mut apu.timers.timers[index];
		timer.counter = bank_in[register::T0OUT + index] & 0xF;
		timer.target = bank_out[register::T0TARGET + index];
		w.walk_i32(&mut timer.divider);
	}

	// Shared memory, including the parked bytes under the boot ROM.
	w.bytes(&mut apu.memory.ram);
	w.bytes(&mut apu.memory.hi_ram);
	w.walk_bool(&mut apu.memory.rom_enabled);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn validation_rejects_garbage() {
		assert_eq!(
			validate_block(&[0; 16]),
			Err(StateBlockError::WrongLength { actual: 16 })
		);
		let mut block = vec![0_u8; STATE_BLOCK_SIZE];
		assert_eq!(validate_block(&block), Err(StateBlockError::TagMismatch));
		block[.. 8].copy_from_slice(&STATE_TAG);
		assert_eq!(validate_block(&block), Ok(()));
	}

	#[test]
	fn loader_realigns_the_decode_ring_position() {
		let mut apu = Apu::new();
		let mut block = apu.save_state();
		// Voice 0's ring position sits after the tag, the register file,
		// the echo unit, the DSP globals and the voice's ring samples.
		let buf_pos_offset = 8 + 128 + (1 + 16 * 4 + 8) + 12 + BRR_BUF_SIZE * 4;
		block[buf_pos_offset] = 11;
		apu.load_state(&block).unwrap();
		assert_eq!(apu.dsp.voices[0].buf_pos, 8);
	}

	#[test]
	fn fresh_device_round_trips() {
		let mut apu = Apu::new();
		let block = apu.save_state();
		assert_eq!(block.len(), STATE_BLOCK_SIZE);
		let mut restored = Apu::new();
		restored.load_state(&block).unwrap();
		assert_eq!(restored.save_state(), block);
	}
}
