//! The processing context: the audio subsystem as an explicit state machine.
//!
//! ```text
//! Uninitialized ──ensure──> Suspended <──suspend/resume──> Running
//!        \                      \                           /
//!         └──────────────────────┴────────close────────────┴──> Closed
//! ```

use tracing::{debug, info};

use crate::error::Error;
use crate::graph::AudioGraph;
use crate::host::{AudioHost, OutputStream, StreamInfo};
use crate::node::{NodeId, BLOCK_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    Suspended,
    Running,
    Closed,
}

/// Everything that exists once the host output is open.
struct Live<S> {
    graph: AudioGraph,
    stream: S,
    sink: NodeId,
    info: StreamInfo,
    samples_written: usize,
}

pub struct ProcessingContext<H: AudioHost> {
    host: H,
    state: ContextState,
    live: Option<Live<H::Stream>>,
    latency_blocks: usize,
}

impl<H: AudioHost> ProcessingContext<H> {
    /// A context that will open `host` on first use.
    pub fn new(host: H) -> Self {
        Self {
            host,
            state: ContextState::Uninitialized,
            live: None,
            latency_blocks: 32,
        }
    }

    /// How many blocks [`render`](Self::render) keeps queued ahead of the device.
    pub fn with_latency_blocks(mut self, blocks: usize) -> Self {
        self.latency_blocks = blocks.max(1);
        self
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Format of the open output, if any.
    pub fn info(&self) -> Option<StreamInfo> {
        self.live.as_ref().map(|l| l.info)
    }

    /// Open the host output if it isn't yet. The new context starts suspended.
    pub fn ensure(&mut self) -> Result<(), Error> {
        match self.state {
            ContextState::Closed => Err(Error::ContextClosed),
            ContextState::Suspended | ContextState::Running => Ok(()),
            ContextState::Uninitialized => {
                let (sink, stream, info) = self.host.open()?;
                let mut graph = AudioGraph::new(info.sample_rate);
                let sink = graph.add(sink).id();
                graph.set_terminal(sink);

                self.live = Some(Live {
                    graph,
                    stream,
                    sink,
                    info,
                    samples_written: 0,
                });
                self.state = ContextState::Suspended;
                info!(sample_rate = info.sample_rate, channels = info.channels, "processing context created");
                Ok(())
            }
        }
    }

    /// Start the output if it is suspended. No-op when already running.
    pub fn resume(&mut self) -> Result<(), Error> {
        self.ensure()?;
        if self.state == ContextState::Suspended {
            if let Some(live) = self.live.as_mut() {
                live.stream.resume()?;
            }
            self.state = ContextState::Running;
            debug!("processing context resumed");
        }
        Ok(())
    }

    /// Pause the output, keeping the graph intact.
    pub fn suspend(&mut self) -> Result<(), Error> {
        match self.state {
            ContextState::Closed => Err(Error::ContextClosed),
            ContextState::Running => {
                if let Some(live) = self.live.as_mut() {
                    live.stream.suspend()?;
                }
                self.state = ContextState::Suspended;
                debug!("processing context suspended");
                Ok(())
            }
            ContextState::Uninitialized | ContextState::Suspended => Ok(()),
        }
    }

    /// Tear everything down. The context cannot be reopened.
    pub fn close(&mut self) {
        if let Some(mut live) = self.live.take() {
            if let Err(e) = live.stream.suspend() {
                debug!("suspend on close failed: {e}");
            }
        }
        self.state = ContextState::Closed;
        info!("processing context closed");
    }

    pub fn graph(&self) -> Option<&AudioGraph> {
        self.live.as_ref().map(|l| &l.graph)
    }

    pub fn graph_mut(&mut self) -> Option<&mut AudioGraph> {
        self.live.as_mut().map(|l| &mut l.graph)
    }

    /// The output sink node, the end of every chain.
    pub fn sink(&self) -> Option<NodeId> {
        self.live.as_ref().map(|l| l.sink)
    }

    pub fn stream_mut(&mut self) -> Option<&mut H::Stream> {
        self.live.as_mut().map(|l| &mut l.stream)
    }

    /// Process as many blocks as fit in the output's latency window.
    ///
    /// Only renders while running; returns the number of blocks processed.
    pub fn render(&mut self) -> usize {
        if self.state != ContextState::Running {
            return 0;
        }
        let Some(live) = self.live.as_mut() else {
            return 0;
        };

        let block = BLOCK_SIZE * live.info.channels as usize;
        let window = (block * self.latency_blocks).min(live.info.capacity);
        let mut rendered = 0;

        loop {
            let queued = live.samples_written.saturating_sub(live.stream.samples_consumed());
            if queued + block > window {
                break;
            }
            live.graph.process();
            live.samples_written += block;
            rendered += 1;
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OfflineHost;

    #[test]
    fn lifecycle_transitions() {
        let mut ctx = ProcessingContext::new(OfflineHost::new(48_000, 2));
        assert_eq!(ctx.state(), ContextState::Uninitialized);
        assert!(ctx.graph().is_none());

        ctx.ensure().unwrap();
        assert_eq!(ctx.state(), ContextState::Suspended);
        assert_eq!(ctx.graph().map(|g| g.node_count()), Some(1));

        ctx.ensure().unwrap();
        assert_eq!(ctx.host().opened(), 1);

        ctx.resume().unwrap();
        assert_eq!(ctx.state(), ContextState::Running);
        ctx.resume().unwrap();
        assert_eq!(ctx.state(), ContextState::Running);

        ctx.suspend().unwrap();
        assert_eq!(ctx.state(), ContextState::Suspended);
        assert_eq!(ctx.render(), 0);

        ctx.close();
        assert_eq!(ctx.state(), ContextState::Closed);
        assert_eq!(ctx.resume(), Err(Error::ContextClosed));
        assert_eq!(ctx.ensure(), Err(Error::ContextClosed));
    }

    #[test]
    fn resume_creates_context_lazily() {
        let mut ctx = ProcessingContext::new(OfflineHost::new(44_100, 2));
        ctx.resume().unwrap();
        assert_eq!(ctx.state(), ContextState::Running);
        assert_eq!(ctx.info().map(|i| i.sample_rate), Some(44_100));
    }

    #[test]
    fn unsupported_platform_is_permanent() {
        let mut ctx = ProcessingContext::new(OfflineHost::unavailable());
        assert_eq!(ctx.ensure(), Err(Error::UnsupportedPlatform));
        assert_eq!(ctx.state(), ContextState::Uninitialized);
        assert_eq!(ctx.resume(), Err(Error::UnsupportedPlatform));
    }

    #[test]
    fn render_fills_latency_window_then_waits_for_consumer() {
        let mut ctx = ProcessingContext::new(OfflineHost::new(48_000, 2)).with_latency_blocks(4);
        ctx.resume().unwrap();

        assert_eq!(ctx.render(), 4);
        assert_eq!(ctx.render(), 0);

        let drained = ctx.stream_mut().map(|s| s.drain().len()).unwrap_or(0);
        assert_eq!(drained, 4 * BLOCK_SIZE * 2);
        assert_eq!(ctx.render(), 4);
    }
}
