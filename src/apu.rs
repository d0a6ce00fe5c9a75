//! The owned device handle tying the pieces together: shared memory, DSP,
//! coprocessor peripherals, timers, ports and the output queue.
//!
//! All public entry points take explicit clock values in a shared relative
//! timebase. The host advances the device with [`Apu::execute`], rebases the
//! timebase with [`Apu::set_reference_time`] once per host frame, and the
//! external instruction interpreter performs every memory access through
//! [`Apu::smp_read`]/[`Apu::smp_write`] so peripheral side effects happen at
//! the right clock.

use crate::dsp::Dsp;
use crate::memory::{MEMORY_SIZE, Memory, ROM_ADDR};
use crate::output::SampleQueue;
use crate::smp::{ControlFlags, CpuRegisters, SMP_REGISTER_BASE, Smp, register};
use crate::timing::{CLOCKS_PER_SAMPLE, Ports, TEMPO_UNIT, Timers};

/// The complete audio subsystem as one owned device.
pub struct Apu {
	pub(crate) memory:         Memory,
	pub(crate) dsp:            Dsp,
	pub(crate) smp:            Smp,
	pub(crate) timers:         Timers,
	pub(crate) ports:          Ports,
	pub(crate) output:         SampleQueue,
	/// Clock the coprocessor side has been driven to.
	pub(crate) spc_time:       i32,
	/// Clock of the last completed DSP sample boundary.
	pub(crate) dsp_time:       i32,
	/// Clocks discarded from the timebase by reference rebasing; the host
	/// can use this to keep absolute time.
	pub(crate) extra_clocks:   i32,
	/// Whether [`Apu::execute`] may outrun the output queue. When it may,
	/// the oldest queued frames are dropped instead of clamping execution.
	pub(crate) allow_overflow: bool,
}

impl Default for Apu {
	fn default() -> Self {
		Self::new()
	}
}

impl Apu {
	/// Creates a freshly power-cycled device.
	#[must_use]
	pub fn new() -> Self {
		let mut this = Self {
			memory:         Memory::new(),
			dsp:            Dsp::new(),
			smp:            Smp::new(),
			timers:         Timers::new(),
			ports:          Ports::default(),
			output:         SampleQueue::new(),
			spc_time:       0,
			dsp_time:       0,
			extra_clocks:   0,
			allow_overflow: false,
		};
		this.reset();
		this
	}

	/// Power-cycle: clears RAM and all dynamic state. The host's voice mute
	/// mask is a knob, not device state, and survives.
	pub fn reset(&mut self) {
		let mute_mask = self.dsp.mute_mask;
		self.memory = Memory::new();
		self.dsp = Dsp::new();
		self.dsp.mute_mask = mute_mask;
		self.reset_common(0x0F);
	}

	/// Reset without touching memory or the DSP register file; this is the
	/// reset line the host console can pull at runtime.
	pub fn soft_reset(&mut self) {
		self.dsp.soft_reset();
		self.reset_common(0);
	}

	fn reset_common(&mut self, timer_counter_init: u8) {
		self.smp.cpu = CpuRegisters { pc: ROM_ADDR, ..CpuRegisters::default() };
		self.smp.regs = [0; crate::smp::SMP_REGISTER_COUNT];
		self.smp.regs[register::TEST] = 0x0A;
		self.smp.regs[register::CONTROL] = 0xB0;
		self.memory.ram[SMP_REGISTER_BASE as usize .. SMP_REGISTER_BASE as usize + 0x10]
			.copy_from_slice(&self.smp.regs);
		self.memory.set_rom_enabled(true);

		self.timers = Timers::new();
		for timer in &mut self.timers.timers {
			timer.counter = timer_counter_init & 0xF;
		}
		self.ports = Ports::default();
		self.output.clear();
		self.spc_time = 0;
		self.dsp_time = 0;
		self.extra_clocks = 0;
	}

	/// Runs the device up to clock `time`. With overflow disallowed, the
	/// target is clamped so the output queue never drops frames; the host is
	/// expected to mix samples out before continuing.
	pub fn execute(&mut self, time: i32) {
		let mut target = time;
		if !self.allow_overflow {
			#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
			let limit = self.dsp_time
				+ self.output.free_frames() as i32 * CLOCKS_PER_SAMPLE
				+ (CLOCKS_PER_SAMPLE - 1);
			if target > limit {
				log::warn!(
					"sample queue full; clamping execution from clock {target} to {limit}"
				);
				target = limit;
			}
		}
		if target > self.spc_time {
			self.spc_time = target;
		}
		self.run_until(self.spc_time);
	}

	/// Advances the DSP to all sample boundaries at or before `time`.
	fn run_until(&mut self, time: i32) {
		while time - self.dsp_time >= CLOCKS_PER_SAMPLE {
			self.dsp_time += CLOCKS_PER_SAMPLE;
			let frame = self.dsp.run_sample(&mut self.memory);
			self.output.push(frame, self.allow_overflow);
		}
	}

	/// Subtracts `end_time` from the device timebase so clock values stay
	/// small. Everything pending is first brought up to `end_time`.
	pub fn set_reference_time(&mut self, end_time: i32) {
		self.run_until(end_time);
		self.timers.run_to(end_time);
		if end_time > self.spc_time {
			self.spc_time = end_time;
		}
		self.spc_time -= end_time;
		self.dsp_time -= end_time;
		self.timers.rebase(end_time);
		self.ports.rebase(end_time);
		self.extra_clocks += end_time;
	}

	/// Clocks removed from the timebase by [`Apu::set_reference_time`] so
	/// far.
	#[must_use]
	pub fn extra_clocks(&self) -> i32 {
		self.extra_clocks
	}

	/// Speeds the timers up by `ticks` tempo units (negative slows them
	/// down); the DSP sample rate is unaffected. Used by hosts that skew
	/// music tempo without resampling.
	pub fn set_timing_speedup(&mut self, ticks: i32) {
		self.timers.set_tempo(TEMPO_UNIT - ticks);
	}

	/// Chooses the overflow policy for [`Apu::execute`]: when allowed, the
	/// device runs the full requested span and the oldest queued frames are
	/// dropped; when disallowed, execution clamps at the queue's capacity.
	pub fn allow_time_overflow(&mut self, allow: bool) {
		self.allow_overflow = allow;
	}

	/// Holds the given voices keyed off until unmuted. A host debugging aid;
	/// not part of the serialized state.
	pub fn set_voice_mute_mask(&mut self, mask: u8) {
		self.dsp.mute_mask = mask;
	}

	// ------------------------------------------------------------------
	// Coprocessor bus
	// ------------------------------------------------------------------

	/// A read performed by the coprocessor at clock `time`.
	pub fn smp_read(&mut self, address: u16, time: i32) -> u8 {
		if (SMP_REGISTER_BASE .. SMP_REGISTER_BASE + 0x10).contains(&address) {
			self.read_peripheral((address - SMP_REGISTER_BASE) as usize, time)
		} else {
			self.memory.read(address)
		}
	}

	/// A write performed by the coprocessor at clock `time`. Peripheral
	/// registers also write through to the RAM underneath them.
	pub fn smp_write(&mut self, address: u16, data: u8, time: i32) {
		if (SMP_REGISTER_BASE .. SMP_REGISTER_BASE + 0x10).contains(&address) {
			self.memory.write(address, data);
			self.write_peripheral((address - SMP_REGISTER_BASE) as usize, data, time);
		} else if address >= ROM_ADDR {
			self.memory.write_high(address, data);
		} else {
			self.memory.write(address, data);
		}
	}

	fn read_peripheral(&mut self, index: usize, time: i32) -> u8 {
		match index {
			register::DSPDATA => {
				// The DSP must be caught up so readbacks (ENVX, OUTX, ENDX)
				// are current.
				self.run_until(time);
				self.dsp.read_register(self.smp.regs[register::DSPADDR])
			},
			register::CPUIO0 ..= register::CPUIO3 =>
				self.ports.to_smp[index - register::CPUIO0].read(time),
			register::T0OUT ..= register::T2OUT =>
				self.timers.timers[index - register::T0OUT].read_output(time),
			_ => self.smp.regs[index],
		}
	}

	fn write_peripheral(&mut self, index: usize, data: u8, time: i32) {
		self.smp.regs[index] = data;
		match index {
			register::TEST => {
				if data != 0x0A {
					log::warn!("unusual TEST register value ${data:02X}");
				}
			},
			register::CONTROL => {
				let control = ControlFlags::from_bits_truncate(data);
				for (bit, timer) in self.timers.timers.iter_mut().enumerate() {
					timer.set_enabled(time, data & (1 << bit) != 0);
				}
				if control.contains(ControlFlags::CLEAR_PORTS_01) {
					self.ports.to_smp[0].clear();
					self.ports.to_smp[1].clear();
				}
				if control.contains(ControlFlags::CLEAR_PORTS_23) {
					self.ports.to_smp[2].clear();
					self.ports.to_smp[3].clear();
				}
				self.memory.set_rom_enabled(control.contains(ControlFlags::ROM_ENABLE));
			},
			register::DSPDATA => {
				self.run_until(time);
				self.dsp.write_register(self.smp.regs[register::DSPADDR], data);
			},
			register::CPUIO0 ..= register::CPUIO3 =>
				self.ports.to_host[index - register::CPUIO0].write(time, data),
			register::T0TARGET ..= register::T2TARGET => {
				let timer = &mut self.timers.timers[index - register::T0TARGET];
				timer.run_to(time);
				timer.target = data;
			},
			_ => {},
		}
	}

	// ------------------------------------------------------------------
	// Host-side surface
	// ------------------------------------------------------------------

	/// Host-side read of a communication port at clock `time`.
	pub fn read_port(&mut self, time: i32, port: usize) -> u8 {
		self.ports.to_host[port & 3].read(time)
	}

	/// Host-side write of a communication port at clock `time`.
	pub fn write_port(&mut self, time: i32, port: usize, data: u8) {
		self.ports.to_smp[port & 3].write(time, data);
	}

	/// Interleaved samples currently queued.
	#[must_use]
	pub fn sample_count(&self) -> usize {
		self.output.sample_count()
	}

	/// Moves queued frames into `out` as interleaved stereo samples,
	/// padding with silence on underrun; returns samples actually mixed.
	pub fn mix_samples(&mut self, out: &mut [i16]) -> usize {
		self.output.mix_into(out)
	}

	/// Discards all queued frames.
	pub fn clear_samples(&mut self) {
		self.output.clear();
	}

	/// The shared 64 KiB memory image.
	#[must_use]
	pub fn apuram(&self) -> &[u8; MEMORY_SIZE] {
		&self.memory.ram
	}

	/// Mutable access to the shared memory image, for hosts that upload
	/// programs or sample data directly.
	pub fn apuram_mut(&mut self) -> &mut [u8; MEMORY_SIZE] {
		&mut self.memory.ram
	}

	/// The coprocessor's architectural registers.
	#[must_use]
	pub fn cpu_registers(&self) -> &CpuRegisters {
		&self.smp.cpu
	}

	/// Mutable access for the external instruction interpreter.
	pub fn cpu_registers_mut(&mut self) -> &mut CpuRegisters {
		&mut self.smp.cpu
	}
}
