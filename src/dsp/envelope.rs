//! Per-voice envelope generator.
//!
//! The envelope is an 11-bit level driven either by the hardware ADSR
//! sequencer or by the GAIN register's five modes. Level steps are gated by
//! the DSP-global rate counter, but the generator keeps an ungated shadow of
//! the level it would have reached; the bent-increase GAIN mode reads that
//! shadow, not the visible level, when deciding where the ramp bends.

use num_derive::FromPrimitive;

use super::tables::counter_fires;

/// Ceiling of the 11-bit envelope level.
pub const ENVELOPE_RANGE: i32 = 0x800;

/// Level at which GAIN mode 7 switches from the steep to the shallow slope.
const BEND_LEVEL: i32 = 0x600;

/// Phase of the envelope generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, FromPrimitive)]
#[repr(u8)]
pub enum EnvelopeMode {
	/// Ramping down towards silence after key-off.
	#[default]
	Release = 0,
	/// Ramping up after key-on.
	Attack  = 1,
	/// Exponential fall towards the sustain level.
	Decay   = 2,
	/// Holding at (or falling from) the sustain level.
	Sustain = 3,
}

/// Envelope state of one voice.
#[derive(Clone, Copy, Default)]
pub struct Envelope {
	/// The visible 11-bit level, updated only on rate counter events.
	pub(crate) level:        i32,
	/// Ungated shadow level, pre-clamping. May briefly hold values outside
	/// the 11-bit range.
	pub(crate) hidden_level: i32,
	pub(crate) mode:         EnvelopeMode,
}

impl Envelope {
	/// Runs one envelope step. `adsr0` is the latched first ADSR byte;
	/// `adsr1` and `gain` are the voice's live register values. `counter` is
	/// the DSP-global rate counter.
	pub fn run(&mut self, adsr0: u8, adsr1: u8, gain: u8, counter: i32) {
		let mut env = self.level;

		if self.mode == EnvelopeMode::Release {
			// Release ignores the rate counter entirely.
			env -= 0x8;
			if env < 0 {
				env = 0;
			}
			self.level = env;
			return;
		}

		let mut env_data = i32::from(adsr1);
		let rate;
		if adsr0 & 0x80 != 0 {
			// ADSR sequencer.
			if self.mode >= EnvelopeMode::Decay {
				env -= 1;
				env -= env >> 8;
				rate = if self.mode == EnvelopeMode::Decay {
					((i32::from(adsr0) >> 3) & 0x0E) + 0x10
				} else {
					env_data & 0x1F
				};
			} else {
				rate = (i32::from(adsr0) & 0x0F) * 2 + 1;
				env += if rate < 31 { 0x20 } else { 0x400 };
			}
		} else {
			env_data = i32::from(gain);
			let mode = env_data >> 5;
			if mode < 4 {
				// Direct level, applied every sample.
				env = env_data * 0x10;
				rate = 31;
			} else {
				rate = env_data & 0x1F;
				match mode {
					4 => env -= 0x20,
					5 => {
						env -= 1;
						env -= env >> 8;
					},
					_ => {
						env += 0x20;
						if mode > 6 && self.hidden_level as u32 >= BEND_LEVEL as u32 {
							env += 0x8 - 0x20;
						}
					},
				}
			}
		}

		if (env >> 8) == (env_data >> 5) && self.mode == EnvelopeMode::Decay {
			self.mode = EnvelopeMode::Sustain;
		}

		// The shadow keeps the unclamped value.
		self.hidden_level = env;

		// Unsigned comparison so linear-decrease underflow clamps too.
		if env as u32 >= ENVELOPE_RANGE as u32 {
			env = if env < 0 { 0 } else { ENVELOPE_RANGE - 1 };
			if self.mode == EnvelopeMode::Attack {
				self.mode = EnvelopeMode::Decay;
			}
		}

		if counter_fires(counter, rate as usize) {
			self.level = env;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn attack_saturates_and_enters_decay() {
		let mut envelope =
			Envelope { level: 0x7E0, hidden_level: 0x7E0, mode: EnvelopeMode::Attack };
		// ADSR, attack rate 15: the fast +0x400 step, applied every sample.
		envelope.run(0x8F, 0xE0, 0, 0);
		assert_eq!(envelope.level, 0x7FF);
		assert_eq!(envelope.mode, EnvelopeMode::Decay);
		// The shadow keeps the pre-clamp overshoot.
		assert_eq!(envelope.hidden_level, 0xBE0);
		// First decay step: exponential decrement.
		envelope.run(0x8F, 0xE0, 0, 0);
		assert_eq!(envelope.level, 0x7F7);
	}

	#[test]
	fn release_ramps_down_without_rate_gating() {
		let mut envelope = Envelope { level: 0x14, hidden_level: 0, mode: EnvelopeMode::Release };
		// Rate counter value is irrelevant in release.
		envelope.run(0x00, 0x00, 0x00, 7);
		assert_eq!(envelope.level, 0x0C);
		envelope.run(0x00, 0x00, 0x00, 7);
		assert_eq!(envelope.level, 0x04);
		envelope.run(0x00, 0x00, 0x00, 7);
		assert_eq!(envelope.level, 0);
	}

	#[test]
	fn gain_direct_mode_jumps_to_level() {
		let mut envelope = Envelope { level: 0, hidden_level: 0, mode: EnvelopeMode::Sustain };
		envelope.run(0x00, 0x00, 0x5A, 0);
		assert_eq!(envelope.level, 0x5A0);
	}

	#[test]
	fn bent_increase_reads_the_shadow_level() {
		// Visible level below the bend, shadow at the bend: the shallow
		// slope must win.
		let mut envelope =
			Envelope { level: 0x5F0, hidden_level: 0x600, mode: EnvelopeMode::Sustain };
		envelope.run(0x00, 0x00, 0xFF, 0);
		assert_eq!(envelope.level, 0x5F8);
	}
}
