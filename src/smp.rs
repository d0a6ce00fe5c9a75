//! Coprocessor-side state: the architectural CPU registers (owned here,
//! executed elsewhere) and the peripheral register page at $F0..$FF.
//!
//! The instruction interpreter lives outside this crate and drives the bus
//! through [`crate::Apu::smp_read`]/[`crate::Apu::smp_write`]; all the
//! peripheral side effects of those accesses are decoded by the device
//! handle, which owns the timers, ports and DSP the page fronts for.

use bitflags::bitflags;

/// First address of the peripheral register page.
pub const SMP_REGISTER_BASE: u16 = 0xF0;

/// Number of peripheral registers.
pub const SMP_REGISTER_COUNT: usize = 0x10;

/// Peripheral register offsets within the $F0 page.
pub mod register {
	/// Undocumented test register.
	pub const TEST: usize = 0x0;
	/// Timer enables, port clears, boot ROM mapping.
	pub const CONTROL: usize = 0x1;
	/// DSP register address latch.
	pub const DSPADDR: usize = 0x2;
	/// DSP register data window.
	pub const DSPDATA: usize = 0x3;
	/// First communication port.
	pub const CPUIO0: usize = 0x4;
	/// Last communication port.
	pub const CPUIO3: usize = 0x7;
	/// Plain memory, despite sitting in the register page.
	pub const AUX0: usize = 0x8;
	/// Plain memory, despite sitting in the register page.
	pub const AUX1: usize = 0x9;
	/// Timer 0 period.
	pub const T0TARGET: usize = 0xA;
	/// Timer 2 period.
	pub const T2TARGET: usize = 0xC;
	/// Timer 0 output counter (clears on read).
	pub const T0OUT: usize = 0xD;
	/// Timer 2 output counter (clears on read).
	pub const T2OUT: usize = 0xF;
}

bitflags! {
	/// The CONTROL register at $F1.
	#[repr(transparent)]
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub struct ControlFlags: u8 {
		/// Timer 0 running.
		const TIMER_0_ENABLE = 0b0000_0001;
		/// Timer 1 running.
		const TIMER_1_ENABLE = 0b0000_0010;
		/// Timer 2 running.
		const TIMER_2_ENABLE = 0b0000_0100;
		/// Clears inbound ports 0 and 1 on write.
		const CLEAR_PORTS_01 = 0b0001_0000;
		/// Clears inbound ports 2 and 3 on write.
		const CLEAR_PORTS_23 = 0b0010_0000;
		/// Maps the boot ROM over the top of RAM.
		const ROM_ENABLE     = 0b1000_0000;
	}
}

/// Architectural registers of the sound coprocessor. Public so the external
/// instruction interpreter can drive them; this crate only resets and
/// serializes them.
#[derive(Clone, Copy, Default)]
pub struct CpuRegisters {
	/// Program counter.
	pub pc:  u16,
	/// Accumulator.
	pub a:   u8,
	/// X index register.
	pub x:   u8,
	/// Y index register.
	pub y:   u8,
	/// Stack pointer (low byte; the stack page is fixed at $01xx).
	pub sp:  u8,
	/// Processor status word.
	pub psw: u8,
}

/// Coprocessor state outside the shared RAM: CPU registers and the last
/// written value of each peripheral register.
pub struct Smp {
	/// The architectural CPU registers.
	pub cpu:         CpuRegisters,
	/// Written values of the $F0 page. Dynamic registers (ports, timer
	/// outputs) read from their owning component instead of this array.
	pub(crate) regs: [u8; SMP_REGISTER_COUNT],
}

impl Smp {
	pub(crate) fn new() -> Self {
		Self { cpu: CpuRegisters::default(), regs: [0; SMP_REGISTER_COUNT] }
	}

	/// The CONTROL register, typed.
	#[must_use]
	pub(crate) fn control(&self) -> ControlFlags {
		ControlFlags::from_bits_truncate(self.regs[register::CONTROL])
	}
}
