//! Per-voice sample machinery: the BRR block decoder, the decode ring
//! buffer, and Gaussian pitch interpolation.

use super::envelope::Envelope;
use super::tables::GAUSS;
use crate::dsp::clamp16;

/// Samples held in the decode ring buffer.
pub const BRR_BUF_SIZE: usize = 12;

/// Bytes per BRR block: one header plus 16 nybbles.
pub const BRR_BLOCK_SIZE: u16 = 9;

/// One DSP voice.
///
/// Holds the decode ring buffer and playback cursors; envelope state lives in
/// the embedded [`Envelope`]. Transient per-sample values (current output,
/// latched pitch) stay in the pipeline, not here.
#[derive(Clone)]
pub struct Voice {
	/// Decode ring buffer. The second half mirrors the first so that
	/// history and interpolation reads never need index wrapping.
	pub(crate) buf:        [i32; BRR_BUF_SIZE * 2],
	/// Write position of the next decoded group, a multiple of 4 below
	/// [`BRR_BUF_SIZE`].
	pub(crate) buf_pos:    usize,
	/// Playback position: bits 12+ index the ring buffer, bits 4..12 select
	/// the interpolation kernel offset.
	pub(crate) interp_pos: i32,
	/// Address of the current BRR block's header byte.
	pub(crate) brr_addr:   u16,
	/// Offset of the next nybble pair within the block (1..9).
	pub(crate) brr_offset: u16,
	/// This voice's bit in the per-voice bitmask registers.
	pub(crate) vbit:       u8,
	/// Countdown of the multi-phase key-on startup sequence; 0 when the
	/// voice is running normally.
	pub(crate) kon_delay:  i32,
	pub(crate) envelope:   Envelope,
	/// Latched envelope readback written to ENVX at the end of the sample.
	pub(crate) envx_out:   u8,
}

impl Voice {
	pub(crate) fn new(index: usize) -> Self {
		Self {
			buf:        [0; BRR_BUF_SIZE * 2],
			buf_pos:    0,
			interp_pos: 0,
			brr_addr:   0,
			brr_offset: 1,
			vbit:       1 << index,
			kon_delay:  0,
			envelope:   Envelope::default(),
			envx_out:   0,
		}
	}

	/// Decodes one group of four BRR samples into the ring buffer.
	/// `nybbles` carries the next four nybbles in its top 16 bits' worth;
	/// `header` is the current block's header byte.
	pub(crate) fn decode_group(&mut self, header: u8, nybbles: i32) {
		let mut nybbles = nybbles;
		let pos = self.buf_pos;
		self.buf_pos += 4;
		if self.buf_pos >= BRR_BUF_SIZE {
			self.buf_pos = 0;
		}

		for i in 0 .. 4 {
			let mut s = i32::from(nybbles as i16) >> 12;
			nybbles <<= 4;

			let shift = i32::from(header) >> 4;
			s = (s << shift) >> 1;
			if shift >= 0xD {
				// Invalid shifts collapse to sign-only output.
				s = (s >> 25) << 11;
			}

			// IIR history from the mirror half; no wrapping needed.
			let filter = header & 0x0C;
			let p1 = self.buf[pos + i + BRR_BUF_SIZE - 1];
			let p2 = self.buf[pos + i + BRR_BUF_SIZE - 2] >> 1;
			if filter >= 8 {
				s += p1;
				s -= p2;
				if filter == 8 {
					s += p2 >> 4;
					s += (p1 * -3) >> 6;
				} else {
					s += (p1 * -13) >> 7;
					s += (p2 * 3) >> 4;
				}
			} else if filter != 0 {
				s += p1 >> 1;
				s += (-p1) >> 5;
			}

			s = clamp16(s);
			s = i32::from((s * 2) as i16);
			self.buf[pos + i] = s;
			self.buf[pos + i + BRR_BUF_SIZE] = s;
		}
	}

	/// Four-tap Gaussian interpolation at the current playback position.
	pub(crate) fn interpolate(&self) -> i32 {
		let offset = ((self.interp_pos >> 4) & 0xFF) as usize;
		let forward = &GAUSS[255 - offset ..];
		let reverse = &GAUSS[offset ..];
		let input = &self.buf[(self.interp_pos >> 12) as usize + self.buf_pos ..];

		// The first three taps accumulate with 16-bit truncation; with
		// kernel sums above 2^11 this is an audible hardware artifact.
		let mut out = (forward[0] * input[0]) >> 11;
		out += (forward[256] * input[1]) >> 11;
		out += (reverse[256] * input[2]) >> 11;
		out = i32::from(out as i16);
		out += (reverse[0] * input[3]) >> 11;

		clamp16(out) & !1
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case::filter_0(0x00, 0x1234, [0, 0], [0, 2, 2, 4])]
	#[case::filter_1(0x44, 0x0000, [128, 256], [240, 224, 210, 196])]
	#[case::filter_2(0x48, 0x0000, [128, 256], [368, 460, 530, 578])]
	#[case::filter_3(0x4C, 0x0000, [128, 256], [356, 430, 482, 516])]
	fn decode_filters(
		#[case] header: u8,
		#[case] nybbles: i32,
		#[case] history: [i32; 2],
		#[case] expected: [i32; 4],
	) {
		let mut voice = Voice::new(0);
		voice.buf[BRR_BUF_SIZE - 2] = history[0];
		voice.buf[BRR_BUF_SIZE - 1] = history[1];
		voice.decode_group(header, nybbles);
		assert_eq!(voice.buf[.. 4], expected);
		// The mirror half tracks the decoded samples.
		assert_eq!(voice.buf[BRR_BUF_SIZE .. BRR_BUF_SIZE + 4], expected);
		assert_eq!(voice.buf_pos, 4);
	}

	#[test]
	fn invalid_shift_collapses_to_sign() {
		let mut voice = Voice::new(0);
		voice.decode_group(0xD0, 0xF100u32 as i32);
		assert_eq!(voice.buf[0], -4096);
		assert_eq!(voice.buf[1], 0);
	}

	#[test]
	fn interpolation_passes_steady_input_through() {
		let mut voice = Voice::new(3);
		voice.buf = [1000; BRR_BUF_SIZE * 2];
		voice.interp_pos = 0;
		// Kernel sum at offset 0 is 2049/2048; unity gain within rounding.
		let out = voice.interpolate();
		assert!((996 ..= 1000).contains(&out), "{out}");
	}
}
