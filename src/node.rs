//! Core node trait and context types.

use dasp_graph::{Buffer, Input};

/// Samples per processing block. Fixed by `dasp_graph`.
pub const BLOCK_SIZE: usize = Buffer::LEN;

/// Information available during audio processing.
///
/// Passed to every [`AudioNode::process`] call.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Sample rate of the graph in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Number of samples per buffer (always [`BLOCK_SIZE`])
    pub buffer_size: usize,
}

/// Unique identifier for a node within a graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

/// The core trait for audio processing nodes.
///
/// The player graph is made of three kinds of node:
/// - **Sources**: a media element tap (0 inputs, 2 outputs)
/// - **Effects**: the gain stage and the analyser tap (1 input, 2 outputs)
/// - **Sinks**: the output ring buffer (1 input, 0 outputs)
///
/// # Message-Based Parameters
///
/// Nodes never share mutable state with the control side. Parameter updates
/// arrive as messages, drained at the start of each block:
///
/// ```
/// use superears::{AudioNode, ProcessContext};
/// use dasp_graph::{Buffer, Input};
///
/// enum TrimMessage {
///     Set(f32),
/// }
///
/// struct Trim {
///     level: f32,
/// }
///
/// impl AudioNode for Trim {
///     type Message = TrimMessage;
///
///     fn process(
///         &mut self,
///         _ctx: &ProcessContext,
///         messages: impl Iterator<Item = TrimMessage>,
///         inputs: &[Input],
///         outputs: &mut [Buffer],
///     ) {
///         for msg in messages {
///             match msg {
///                 TrimMessage::Set(v) => self.level = v,
///             }
///         }
///         let Some(input) = inputs.first() else { return };
///         for (out, inp) in outputs.iter_mut().zip(input.buffers()) {
///             for (o, i) in out.iter_mut().zip(inp.iter()) {
///                 *o = *i * self.level;
///             }
///         }
///     }
///
///     fn num_inputs(&self) -> usize { 1 }
/// }
/// ```
pub trait AudioNode: Send + 'static {
    /// Message type for parameter updates.
    ///
    /// Use a custom enum for nodes with parameters, or `()` for nodes without.
    type Message: Send + 'static;

    /// Process one block of audio.
    ///
    /// Called once per block of [`BLOCK_SIZE`] samples. Implementations should:
    /// 1. Drain and handle all pending messages
    /// 2. Read from `inputs` (if any)
    /// 3. Write to `outputs`
    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = Self::Message>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    );

    /// Number of audio input channels (0 for sources).
    fn num_inputs(&self) -> usize { 0 }

    /// Number of audio output channels.
    fn num_outputs(&self) -> usize { 1 }
}
