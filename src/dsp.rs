//! The S-DSP: an 8-voice sample-based synthesizer with echo, noise and
//! pitch modulation, producing one stereo sample every 32 coprocessor
//! clocks.
//!
//! The pipeline runs once per sample tick. Cross-cutting register state
//! (key-on/key-off, the control flags) is committed at the start of the tick
//! rather than read mid-pipeline, so a bus write between ticks can never be
//! observed half-applied; key-on/key-off additionally latch only on every
//! second tick, which is where the two-sample key-on latency comes from.

pub mod echo;
pub mod envelope;
pub mod registers;
pub mod tables;
pub mod voice;

use echo::EchoState;
use envelope::EnvelopeMode;
use registers::{DspFlags, DspRegisters, VOICE_COUNT, global, voice as vreg};
use tables::{SIMPLE_COUNTER_RANGE, counter_fires};
use voice::{BRR_BLOCK_SIZE, Voice};

use crate::memory::Memory;

/// Saturates to the signed 16-bit range.
#[inline]
#[must_use]
pub(crate) const fn clamp16(value: i32) -> i32 {
	if value as i16 as i32 != value { (value >> 31) ^ 0x7FFF } else { value }
}

/// Per-sample working values that flow between pipeline stages of a single
/// tick. Fresh every tick; nothing in here survives to the next sample.
#[derive(Default)]
struct TickState {
	/// Output of the most recently processed voice, the pitch modulation
	/// source for its successor.
	output:   i32,
	/// Dry stereo mix accumulator.
	main_out: [i32; 2],
	/// Echo-routed stereo mix accumulator.
	echo_out: [i32; 2],
}

/// The DSP proper: register file, voices, echo unit and the generators
/// shared between voices.
pub struct Dsp {
	pub(crate) regs:               DspRegisters,
	pub(crate) voices:             [Voice; VOICE_COUNT],
	pub(crate) echo:               EchoState,
	/// Global rate counter gating envelope and noise updates.
	pub(crate) counter:            i32,
	/// Noise generator LFSR.
	pub(crate) noise:              i32,
	/// Latched key-on bits being processed this sample pair.
	pub(crate) kon:                u8,
	/// Key-on bits written since the last latch point.
	pub(crate) new_kon:            u8,
	/// Latched key-off bits, including host-muted voices.
	pub(crate) koff:               u8,
	/// Key state latches only on every second sample.
	pub(crate) every_other_sample: bool,
	/// Control flags committed at the current tick's start.
	pub(crate) flags:              DspFlags,
	/// Host-controlled voice mute bits; muted voices are held keyed off.
	pub(crate) mute_mask:          u8,
}

impl Dsp {
	#[must_use]
	pub(crate) fn new() -> Self {
		let mut this = Self {
			regs:               DspRegisters::default(),
			voices:             core::array::from_fn(Voice::new),
			echo:               EchoState::default(),
			counter:            0,
			noise:              0x4000,
			kon:                0,
			new_kon:            0,
			koff:               0,
			every_other_sample: true,
			flags:              DspFlags::empty(),
			mute_mask:          0,
		};
		this.soft_reset();
		this
	}

	/// Resets the DSP's dynamic state while leaving the register file alone
	/// except for FLG, which comes up with reset, mute and echo-disable set.
	pub(crate) fn soft_reset(&mut self) {
		self.regs.values[global::FLG] = 0xE0;
		self.noise = 0x4000;
		self.echo.hist_pos = 0;
		self.echo.offset = 0;
		self.every_other_sample = true;
		self.counter = 0;
		self.flags = self.regs.flags();
	}

	/// Reads a DSP register; bit 7 of the address is ignored.
	#[must_use]
	pub(crate) fn read_register(&self, address: u8) -> u8 {
		self.regs.read(address)
	}

	/// Writes a DSP register; bit 7 of the address is ignored. KON writes
	/// are staged until the next latch point; ENDX ignores the value and
	/// clears all end bits instead.
	pub(crate) fn write_register(&mut self, address: u8, data: u8) {
		let address = address & 0x7F;
		self.regs.write(address, data);
		match address as usize {
			global::KON => self.new_kon = data,
			global::ENDX => self.regs.values[global::ENDX] = 0,
			_ => {},
		}
	}

	/// Commits cross-cutting register state for the tick about to run.
	fn commit(&mut self) {
		self.flags = self.regs.flags();
		self.every_other_sample = !self.every_other_sample;
		if self.every_other_sample {
			self.new_kon &= !self.kon;
			self.kon = self.new_kon;
			self.koff = self.regs.values[global::KOFF] | self.mute_mask;
		}
	}

	/// Runs one sample tick and returns the produced stereo frame.
	pub(crate) fn run_sample(&mut self, memory: &mut Memory) -> (i16, i16) {
		self.commit();

		let mut tick = TickState::default();
		for index in 0 .. VOICE_COUNT {
			self.run_voice(index, memory, &mut tick);
		}
		let frame = self.run_echo(memory, &tick);

		// Rate counter and noise run at the tail of the tick.
		self.counter -= 1;
		if self.counter < 0 {
			self.counter = SIMPLE_COUNTER_RANGE - 1;
		}
		if counter_fires(self.counter, self.flags.noise_rate()) {
			let feedback = (self.noise << 13) ^ (self.noise << 14);
			self.noise = (feedback & 0x4000) ^ (self.noise >> 1);
		}

		frame
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn run_voice(&mut self, index: usize, memory: &mut Memory, tick: &mut TickState) {
		let regs = &mut self.regs;
		let voice = &mut self.voices[index];
		let vbit = voice.vbit;

		// Directory lookup: start address entry, or the loop entry once the
		// voice is past its startup sequence.
		let dir_addr = (u16::from(regs.values[global::DIR]) << 8)
			.wrapping_add(u16::from(regs.voice(index, vreg::SRCN)) * 4);
		let entry = if voice.kon_delay == 0 { dir_addr.wrapping_add(2) } else { dir_addr };
		let brr_next_addr = memory.read_word(entry);

		let adsr0 = regs.voice(index, vreg::ADSR0);
		let mut pitch = i32::from(regs.voice(index, vreg::PITCHL))
			| (i32::from(regs.voice(index, vreg::PITCHH) & 0x3F) << 8);
		// Bit 0 of PMON is ignored; voice 0 has no predecessor.
		if regs.values[global::PMON] & 0xFE & vbit != 0 {
			pitch += ((tick.output >> 5) * pitch) >> 10;
		}

		let mut header = memory.read(voice.brr_addr);
		let brr_byte = memory.read(voice.brr_addr.wrapping_add(voice.brr_offset));

		if voice.kon_delay > 0 {
			// Startup: latch the start address, then stall output for five
			// samples while the first blocks decode.
			if voice.kon_delay == 5 {
				voice.brr_addr = brr_next_addr;
				voice.brr_offset = 1;
				voice.buf_pos = 0;
				header = 0;
			}
			voice.envelope.level = 0;
			voice.envelope.hidden_level = 0;
			voice.kon_delay -= 1;
			voice.interp_pos = if voice.kon_delay & 3 != 0 { 0x4000 } else { 0 };
			pitch = 0;
		}

		let raw = if regs.values[global::NON] & vbit != 0 {
			i32::from((self.noise * 2) as i16)
		} else {
			voice.interpolate()
		};
		tick.output = (raw * voice.envelope.level) >> 11 & !1;
		voice.envx_out = (voice.envelope.level >> 4) as u8;

		// Soft reset or an end block without loop silences the voice.
		if self.flags.contains(DspFlags::SOFT_RESET) || header & 3 == 1 {
			voice.envelope.mode = EnvelopeMode::Release;
			voice.envelope.level = 0;
		}

		if self.every_other_sample {
			if self.koff & vbit != 0 {
				voice.envelope.mode = EnvelopeMode::Release;
			}
			if self.kon & vbit != 0 {
				voice.kon_delay = 5;
				voice.envelope.mode = EnvelopeMode::Attack;
			}
		}

		if voice.kon_delay == 0 {
			let adsr1 = regs.voice(index, vreg::ADSR1);
			let gain = regs.voice(index, vreg::GAIN);
			voice.envelope.run(adsr0, adsr1, gain, self.counter);
		}

		// Decode the next sample group once playback crosses into it.
		let mut looped = 0;
		if voice.interp_pos >= 0x4000 {
			let nybbles = i32::from(brr_byte) * 0x100
				+ i32::from(memory.read(voice.brr_addr.wrapping_add(voice.brr_offset + 1)));
			voice.decode_group(header, nybbles);
			voice.brr_offset += 2;
			if voice.brr_offset >= BRR_BLOCK_SIZE {
				voice.brr_addr = voice.brr_addr.wrapping_add(BRR_BLOCK_SIZE);
				if header & 1 != 0 {
					voice.brr_addr = brr_next_addr;
					looped = vbit;
				}
				voice.brr_offset = 1;
			}
		}
		voice.interp_pos = ((voice.interp_pos & 0x3FFF) + pitch).min(0x7FFF);

		// Mix into the dry and echo buses.
		for (channel, accumulator) in tick.main_out.iter_mut().enumerate() {
			let volume = regs.voice(index, vreg::VOLL + channel) as i8;
			let amp = (tick.output * i32::from(volume)) >> 7;
			*accumulator = clamp16(*accumulator + amp);
			if regs.values[global::EON] & vbit != 0 {
				tick.echo_out[channel] = clamp16(tick.echo_out[channel] + amp);
			}
		}

		// End-status bookkeeping and readback registers.
		let mut endx = regs.values[global::ENDX] | looped;
		if voice.kon_delay == 5 {
			endx &= !vbit;
		}
		regs.values[global::ENDX] = endx;
		regs.set_voice(index, vreg::ENVX, voice.envx_out);
		regs.set_voice(index, vreg::OUTX, (tick.output >> 8) as u8);
	}

	#[allow(clippy::cast_possible_truncation)]
	fn run_echo(&mut self, memory: &mut Memory, tick: &TickState) -> (i16, i16) {
		self.echo.advance();
		let ptr = (u16::from(self.regs.values[global::ESA]) << 8)
			.wrapping_add(self.echo.offset as u16);

		for channel in 0 .. 2 {
			let sample = memory.read_word(ptr.wrapping_add(channel as u16 * 2)) as i16;
			self.echo.push(channel, i32::from(sample) >> 1);
		}
		let coefficients = core::array::from_fn(|i| i32::from(self.regs.fir(i) as i8));
		let echo_in: [i32; 2] = core::array::from_fn(|channel| {
			clamp16(self.echo.apply_fir(channel, &coefficients)) & !1
		});

		// Final stereo output.
		let mut frame = [0_i16; 2];
		for (channel, out) in frame.iter_mut().enumerate() {
			let main_volume = self.regs.values[global::MVOLL + channel * 0x10] as i8;
			let echo_volume = self.regs.values[global::EVOLL + channel * 0x10] as i8;
			let mut amp = i32::from(((tick.main_out[channel] * i32::from(main_volume)) >> 7) as i16);
			amp += i32::from(((echo_in[channel] * i32::from(echo_volume)) >> 7) as i16);
			amp = clamp16(amp);
			if self.flags.contains(DspFlags::MUTE) {
				amp = 0;
			}
			*out = amp as i16;
		}

		// Feedback into the ring buffer, unless echo writes are disabled.
		let feedback_volume = i32::from(self.regs.values[global::EFB] as i8);
		for channel in 0 .. 2 {
			let feedback = clamp16(
				tick.echo_out[channel]
					+ i32::from(((echo_in[channel] * feedback_volume) >> 7) as i16),
			) & !1;
			if !self.flags.contains(DspFlags::ECHO_WRITES_DISABLED) {
				let address = ptr.wrapping_add(channel as u16 * 2);
				memory.write(address, feedback as u8);
				memory.write(address.wrapping_add(1), (feedback >> 8) as u8);
			}
		}

		// Ring cursor; the length register is sampled only at wraparound.
		if self.echo.offset == 0 {
			self.echo.length = i32::from(self.regs.values[global::EDL] & 0x0F) * 0x800;
		}
		self.echo.offset += 4;
		if self.echo.offset >= self.echo.length {
			self.echo.offset = 0;
		}

		(frame[0], frame[1])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clamp16_saturates_both_directions() {
		assert_eq!(clamp16(0x7FFF), 0x7FFF);
		assert_eq!(clamp16(0x8000), 0x7FFF);
		assert_eq!(clamp16(-0x8000), -0x8000);
		assert_eq!(clamp16(-0x8001), -0x8000);
		assert_eq!(clamp16(123), 123);
	}

	#[test]
	fn noise_generator_walks_the_lfsr() {
		let mut dsp = Dsp::new();
		let mut memory = Memory::new();
		// Clear reset so the pipeline runs; rate 31 steps noise every tick.
		dsp.write_register(global::FLG as u8, 0x3F);
		assert_eq!(dsp.noise, 0x4000);
		dsp.run_sample(&mut memory);
		assert_eq!(dsp.noise, 0x2000);
		dsp.run_sample(&mut memory);
		assert_eq!(dsp.noise, 0x1000);
	}

	#[test]
	fn endx_write_clears_all_end_bits() {
		let mut dsp = Dsp::new();
		dsp.regs.values[global::ENDX] = 0xA5;
		dsp.write_register(global::ENDX as u8, 0xFF);
		assert_eq!(dsp.read_register(global::ENDX as u8), 0);
	}

	#[test]
	fn register_addresses_alias_in_the_upper_half() {
		let mut dsp = Dsp::new();
		dsp.write_register(0xFF, 0x12);
		assert_eq!(dsp.read_register(0x7F), 0x12);
		assert_eq!(dsp.read_register(0xFF), 0x12);
	}
}
