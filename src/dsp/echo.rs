//! Echo unit state: the stereo sample history ring fed into the 8-tap FIR
//! filter, and the cursor into the echo region of shared memory.
//!
//! The memory traffic itself (ring buffer reads, feedback writes) lives in
//! the sample pipeline; this module owns the history and the FIR arithmetic.

/// Stereo samples of FIR history.
pub const ECHO_HIST_SIZE: usize = 8;

/// Echo unit state.
#[derive(Clone)]
pub struct EchoState {
	/// FIR history, newest at `hist_pos`. Mirrored at `hist_pos + 8` so tap
	/// reads never wrap.
	pub(crate) hist:     [[i32; 2]; ECHO_HIST_SIZE * 2],
	pub(crate) hist_pos: usize,
	/// Byte offset of the next ring buffer slot within the echo region.
	pub(crate) offset:   i32,
	/// Ring buffer length in bytes, latched from EDL at offset wraparound.
	pub(crate) length:   i32,
}

impl Default for EchoState {
	fn default() -> Self {
		Self { hist: [[0; 2]; ECHO_HIST_SIZE * 2], hist_pos: 0, offset: 0, length: 0 }
	}
}

impl EchoState {
	/// Rotates the history ring forward one sample.
	pub(crate) fn advance(&mut self) {
		self.hist_pos = (self.hist_pos + 1) % ECHO_HIST_SIZE;
	}

	/// Stores the sample just read from the ring buffer as the newest
	/// history entry.
	pub(crate) fn push(&mut self, channel: usize, sample: i32) {
		self.hist[self.hist_pos][channel] = sample;
		self.hist[self.hist_pos + ECHO_HIST_SIZE][channel] = sample;
	}

	/// Runs the 8-tap FIR filter over the history for one channel.
	/// `coefficients` are the sign-extended FIR registers, oldest tap first.
	///
	/// The accumulator truncates to 16 bits before the final tap; resonant
	/// filter settings rely on that wraparound.
	pub(crate) fn apply_fir(&self, channel: usize, coefficients: &[i32; 8]) -> i32 {
		let taps = &self.hist[self.hist_pos + 1 ..];
		let mut sum = 0;
		for (tap, coefficient) in taps.iter().zip(coefficients).take(7) {
			sum += (tap[channel] * coefficient) >> 6;
		}
		sum = i32::from(sum as i16);
		sum + i32::from(((taps[7][channel] * coefficients[7]) >> 6) as i16)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fir_identity_taps_oldest_sample() {
		let mut echo = EchoState::default();
		// Fill eight history slots; the value pushed first is the oldest.
		for value in 1 ..= 8 {
			echo.advance();
			echo.push(0, value * 64);
		}
		// Identity filter on tap 0 selects the oldest sample, scaled by
		// 0x7F/64.
		let coefficients = [0x7F, 0, 0, 0, 0, 0, 0, 0];
		assert_eq!(echo.apply_fir(0, &coefficients), (64 * 0x7F) >> 6);
		// Tap 7 selects the newest.
		let coefficients = [0, 0, 0, 0, 0, 0, 0, 0x7F];
		assert_eq!(echo.apply_fir(0, &coefficients), (8 * 64 * 0x7F) >> 6);
	}
}
