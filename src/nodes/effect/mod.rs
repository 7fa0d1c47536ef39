//! Audio effect nodes (processors with audio inputs and outputs)

mod analyser;
mod gain;

pub use analyser::Analyser;
pub use gain::{Gain, GainMessage, GainMonitor};
