//! Cycle-accurate emulation core for the S-APU: the 8-voice sample-based
//! S-DSP synthesizer together with the peripherals of its 8-bit sound
//! coprocessor (I/O ports, timers, control registers, shared memory).
//!
//! The crate models the audio subsystem of the 16-bit console as one owned
//! [`Apu`] device handle. The host emulator drives it with coprocessor clock
//! budgets; the device produces exactly one stereo sample per 32 clocks and
//! exposes the samples through a pull interface. The coprocessor's instruction
//! interpreter is an external collaborator and talks to the device through the
//! [`Apu::smp_read`]/[`Apu::smp_write`] bus seam.
//!
//! Hardware quirks are part of the contract: the multi-phase key-on startup
//! sequence, the hidden envelope shadow level read by the bent-increase gain
//! mode, sticky per-voice end-status bits, and the latched next-boundary
//! application of cross-cutting register writes are all reproduced.

/// Trace message that is compiled out on release builds; bus and register
/// traffic inside the emulation loop is far too hot to log unconditionally,
/// even behind a disabled log level.
macro_rules! trace {
	($($arg:tt)+) => {
		#[cfg(debug_assertions)]
		::log::trace!($($arg)+);
	};
}

pub mod apu;
pub mod dsp;
pub mod memory;
mod output;
pub mod smp;
pub mod state;
pub mod timing;

pub use apu::Apu;
pub use state::{STATE_BLOCK_SIZE, StateBlockError, validate_block};

#[cfg(test)] mod test;
