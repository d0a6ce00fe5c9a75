//! Clock-domain plumbing: the three programmable timers and the delayed
//! I/O port latches.
//!
//! Everything here runs on the coprocessor clock. Time values are relative
//! clock counts that periodically get rebased by the device handle so they
//! never overflow `i32`.

/// Coprocessor clocks consumed per produced stereo sample.
pub const CLOCKS_PER_SAMPLE: i32 = 32;

/// Number of programmable timers.
pub const TIMER_COUNT: usize = 3;

/// Fixed-point unit of the tempo scaler; this value means nominal speed.
pub const TEMPO_UNIT: i32 = 0x100;

/// Clocks a port write stays in flight before the other side can observe it.
pub const PORT_PROPAGATION_CLOCKS: i32 = 2;

/// One programmable interval timer.
///
/// Timers 0 and 1 tick every 128 clocks, timer 2 every 16 clocks (at nominal
/// tempo). Each divides its tick stream by a programmable 8-bit period into a
/// 4-bit up-counter that clears on read.
#[derive(Clone)]
pub struct Timer {
	/// Next absolute (relative-epoch) clock at which this timer ticks.
	pub(crate) next_time: i32,
	/// Clocks per timer tick, already tempo-scaled.
	pub(crate) prescaler: i32,
	/// Ticks accumulated towards the next period rollover.
	pub(crate) divider:   i32,
	/// Programmed period; 0 counts as 256.
	pub(crate) target:    u8,
	/// The 4-bit output counter.
	pub(crate) counter:   u8,
	/// Whether the timer is running.
	pub(crate) enabled:   bool,
}

impl Timer {
	fn new(prescaler: i32) -> Self {
		Self { next_time: prescaler, prescaler, divider: 0, target: 0, counter: 0, enabled: false }
	}

	/// Advances the timer to `time`, folding any elapsed ticks into the
	/// output counter. Ticks keep elapsing while the timer is disabled; they
	/// just don't count.
	pub fn run_to(&mut self, time: i32) {
		if time < self.next_time {
			return;
		}
		let elapsed = (time - self.next_time) / self.prescaler + 1;
		self.next_time += elapsed * self.prescaler;
		if self.enabled {
			let period = if self.target == 0 { 256 } else { i32::from(self.target) };
			let total = self.divider + elapsed;
			self.counter = (self.counter.wrapping_add((total / period) as u8)) & 0xF;
			self.divider = total % period;
		}
	}

	/// Starts or stops the timer. Starting a stopped timer resets the divider
	/// and the output counter.
	pub(crate) fn set_enabled(&mut self, time: i32, enable: bool) {
		self.run_to(time);
		if enable && !self.enabled {
			self.divider = 0;
			self.counter = 0;
		}
		self.enabled = enable;
	}

	/// Reads the 4-bit output counter, which clears on read.
	pub(crate) fn read_output(&mut self, time: i32) -> u8 {
		self.run_to(time);
		let value = self.counter;
		self.counter = 0;
		value
	}
}

/// The three timers plus the tempo scaler that stretches their tick rates.
pub struct Timers {
	pub(crate) timers: [Timer; TIMER_COUNT],
	pub(crate) tempo:  i32,
}

impl Timers {
	#[must_use]
	pub(crate) fn new() -> Self {
		let mut this = Self { timers: [Timer::new(128), Timer::new(128), Timer::new(16)], tempo: TEMPO_UNIT };
		this.set_tempo(TEMPO_UNIT);
		this
	}

	/// Rescales all prescalers for the given tempo. [`TEMPO_UNIT`] is nominal
	/// speed; smaller is faster.
	pub(crate) fn set_tempo(&mut self, tempo: i32) {
		self.tempo = tempo;
		let tempo = tempo.max(1);
		// Round to nearest, but never let a prescaler hit zero.
		let rate = ((16 * TEMPO_UNIT + (tempo >> 1)) / tempo).max(4);
		self.timers[2].prescaler = rate;
		self.timers[0].prescaler = rate << 3;
		self.timers[1].prescaler = rate << 3;
	}

	/// Brings every timer up to date with `time`.
	pub(crate) fn run_to(&mut self, time: i32) {
		for timer in &mut self.timers {
			timer.run_to(time);
		}
	}

	/// Shifts all timer deadlines down when the clock epoch is rebased.
	pub(crate) fn rebase(&mut self, end_time: i32) {
		for timer in &mut self.timers {
			timer.next_time -= end_time;
		}
	}

	/// Re-anchors timer deadlines after a state load, where only the divider
	/// remainders survive serialization.
	pub(crate) fn realign(&mut self, time: i32) {
		for timer in &mut self.timers {
			timer.next_time = time + timer.prescaler;
		}
	}
}

/// A single I/O port byte with write-propagation delay.
///
/// A write does not become visible to readers until
/// [`PORT_PROPAGATION_CLOCKS`] clocks later; a second write before then
/// simply replaces the in-flight value.
#[derive(Clone, Copy, Default)]
pub struct PortLatch {
	pub(crate) value:   u8,
	pub(crate) pending: Option<(u8, i32)>,
}

impl PortLatch {
	/// Applies an in-flight write whose propagation delay has elapsed.
	pub(crate) fn settle(&mut self, now: i32) {
		if let Some((value, at)) = self.pending
			&& now >= at
		{
			self.value = value;
			self.pending = None;
		}
	}

	pub(crate) fn read(&mut self, now: i32) -> u8 {
		self.settle(now);
		self.value
	}

	pub(crate) fn write(&mut self, now: i32, value: u8) {
		self.settle(now);
		self.pending = Some((value, now + PORT_PROPAGATION_CLOCKS));
	}

	/// Drops the latched value and any in-flight write.
	pub(crate) fn clear(&mut self) {
		self.value = 0;
		self.pending = None;
	}

	/// Forces any in-flight write through immediately.
	pub(crate) fn flush(&mut self) {
		if let Some((value, _)) = self.pending.take() {
			self.value = value;
		}
	}

	pub(crate) fn rebase(&mut self, end_time: i32) {
		if let Some((_, at)) = &mut self.pending {
			*at -= end_time;
		}
	}
}

/// The four bidirectional communication ports between host CPU and
/// coprocessor; each direction is an independent latch.
#[derive(Default)]
pub struct Ports {
	/// Host-to-coprocessor latches, read at $F4..$F7.
	pub(crate) to_smp:  [PortLatch; 4],
	/// Coprocessor-to-host latches, written at $F4..$F7.
	pub(crate) to_host: [PortLatch; 4],
}

impl Ports {
	pub(crate) fn rebase(&mut self, end_time: i32) {
		for latch in self.to_smp.iter_mut().chain(self.to_host.iter_mut()) {
			latch.rebase(end_time);
		}
	}

	pub(crate) fn flush(&mut self) {
		for latch in self.to_smp.iter_mut().chain(self.to_host.iter_mut()) {
			latch.flush();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timer_divides_and_clears_on_read() {
		let mut timer = Timer::new(16);
		timer.set_enabled(0, true);
		timer.target = 4;
		// 640 clocks = 40 ticks = 10 rollovers at period 4.
		assert_eq!(timer.read_output(640), 10);
		assert_eq!(timer.read_output(640), 0);
	}

	#[test]
	fn timer_period_zero_counts_as_256() {
		let mut timer = Timer::new(16);
		timer.set_enabled(0, true);
		timer.target = 0;
		timer.run_to(16 * 256 - 1);
		assert_eq!(timer.counter, 0);
		timer.run_to(16 * 256);
		assert_eq!(timer.counter, 1);
	}

	#[test]
	fn disabled_timer_discards_ticks() {
		let mut timer = Timer::new(16);
		timer.target = 1;
		timer.run_to(1000);
		assert_eq!(timer.counter, 0);
		// Enabling afterwards starts counting from scratch.
		timer.set_enabled(1000, true);
		timer.run_to(1031);
		assert_eq!(timer.counter, 2);
	}

	#[test]
	fn port_write_propagates_after_delay() {
		let mut latch = PortLatch::default();
		latch.write(10, 0xAB);
		assert_eq!(latch.read(11), 0);
		assert_eq!(latch.read(12), 0xAB);
	}
}
