//! Buffered sample output: produced stereo frames queue up here until the
//! host mixes them out.

use std::collections::VecDeque;

/// Frames the queue holds before backpressure kicks in.
pub(crate) const QUEUE_CAPACITY: usize = 2048;

/// FIFO of produced stereo frames.
pub(crate) struct SampleQueue {
	frames: VecDeque<(i16, i16)>,
}

impl SampleQueue {
	pub(crate) fn new() -> Self {
		Self { frames: VecDeque::with_capacity(QUEUE_CAPACITY) }
	}

	/// Frames that can still be produced before the queue is full.
	pub(crate) fn free_frames(&self) -> usize {
		QUEUE_CAPACITY - self.frames.len()
	}

	/// Interleaved samples currently queued.
	pub(crate) fn sample_count(&self) -> usize {
		self.frames.len() * 2
	}

	/// Queues a frame. When full, either the oldest frame makes room or the
	/// new one is dropped, depending on the device's overflow policy.
	pub(crate) fn push(&mut self, frame: (i16, i16), drop_oldest: bool) {
		if self.frames.len() >= QUEUE_CAPACITY {
			if !drop_oldest {
				return;
			}
			self.frames.pop_front();
		}
		self.frames.push_back(frame);
	}

	/// Moves queued frames into `out` as interleaved left/right samples.
	/// Underruns pad with silence; returns the samples actually mixed.
	pub(crate) fn mix_into(&mut self, out: &mut [i16]) -> usize {
		let mut mixed = 0;
		for chunk in out.chunks_exact_mut(2) {
			match self.frames.pop_front() {
				Some((left, right)) => {
					chunk[0] = left;
					chunk[1] = right;
					mixed += 2;
				},
				None => {
					chunk[0] = 0;
					chunk[1] = 0;
				},
			}
		}
		mixed
	}

	pub(crate) fn clear(&mut self) {
		self.frames.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn underrun_pads_with_silence() {
		let mut queue = SampleQueue::new();
		queue.push((1, 2), false);
		let mut out = [99; 6];
		assert_eq!(queue.mix_into(&mut out), 2);
		assert_eq!(out, [1, 2, 0, 0, 0, 0]);
		assert_eq!(queue.sample_count(), 0);
	}

	#[test]
	fn overflow_policy_selects_which_end_drops() {
		let mut queue = SampleQueue::new();
		for i in 0 .. QUEUE_CAPACITY {
			queue.push((i as i16, 0), false);
		}
		queue.push((-1, -1), false);
		assert_eq!(queue.frames.front(), Some(&(0, 0)));
		queue.push((-1, -1), true);
		assert_eq!(queue.frames.front(), Some(&(1, 0)));
		assert_eq!(queue.frames.back(), Some(&(-1, -1)));
	}
}
