//! Signal graph manager: builds `Gain -> Analyser -> Sink` exactly once and
//! routes media elements into it.

use rtrb::RingBuffer;
use tracing::{debug, info};

use crate::analysis::AnalyserTap;
use crate::binding::{SourceBinding, SourceBindings};
use crate::config::EngineConfig;
use crate::context::{ContextState, ProcessingContext};
use crate::error::Error;
use crate::graph::NodeHandle;
use crate::host::AudioHost;
use crate::media::MediaElement;
use crate::node::NodeId;
use crate::nodes::{Analyser, Gain, GainMessage, GainMonitor};

/// Control-side endpoints of a freshly built graph.
///
/// Handed out once, by the [`build_graph_once`](SignalGraphManager::build_graph_once)
/// call that actually built the graph.
pub struct GraphControls {
    /// Message port of the gain node
    pub gain: NodeHandle<GainMessage>,
    /// Effective gain as applied by the audio side
    pub monitor: GainMonitor,
    /// Spectrum reader fed by the analyser node
    pub analyser: AnalyserTap,
    /// Sample rate of the graph, for converting ramp durations
    pub sample_rate: u32,
}

#[derive(Clone, Copy, Debug)]
struct GraphNodes {
    gain: NodeId,
    analyser: NodeId,
}

pub struct SignalGraphManager<H: AudioHost> {
    context: ProcessingContext<H>,
    nodes: Option<GraphNodes>,
    bindings: SourceBindings,
    fft_size: usize,
    smoothing: f32,
}

impl<H: AudioHost> SignalGraphManager<H> {
    pub fn new(host: H, config: &EngineConfig) -> Self {
        Self {
            context: ProcessingContext::new(host).with_latency_blocks(config.latency_blocks),
            nodes: None,
            bindings: SourceBindings::new(),
            fft_size: config.fft_size,
            smoothing: config.smoothing,
        }
    }

    pub fn state(&self) -> ContextState {
        self.context.state()
    }

    pub fn context(&self) -> &ProcessingContext<H> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ProcessingContext<H> {
        &mut self.context
    }

    /// Create the processing context if there is none. Idempotent.
    pub fn ensure_context(&mut self) -> Result<(), Error> {
        self.context.ensure()
    }

    /// Resume a suspended context; no-op when running. Must complete before
    /// any source is connected.
    pub fn resume_if_suspended(&mut self) -> Result<(), Error> {
        self.context.resume()
    }

    pub fn suspend(&mut self) -> Result<(), Error> {
        self.context.suspend()
    }

    pub fn close(&mut self) {
        self.context.close();
        self.nodes = None;
    }

    pub fn is_built(&self) -> bool {
        self.nodes.is_some()
    }

    /// Build `Gain -> Analyser -> Sink` unless it already exists.
    ///
    /// Returns the control endpoints only when this call built the graph;
    /// later calls return `Ok(None)` and leave the topology untouched.
    pub fn build_graph_once(&mut self, initial_gain: f32) -> Result<Option<GraphControls>, Error> {
        if self.nodes.is_some() {
            return Ok(None);
        }
        self.context.ensure()?;

        let sink = self.context.sink().ok_or(Error::ContextClosed)?;
        let graph = self.context.graph_mut().ok_or(Error::ContextClosed)?;
        let sample_rate = graph.sample_rate();

        let gain = Gain::new(initial_gain);
        let monitor = gain.monitor();
        let gain = graph.add(gain);

        let (producer, consumer) = RingBuffer::new((self.fft_size * 16).max(4096));
        let analyser = graph.add(Analyser::new(producer)).id();

        graph.connect(gain.id(), analyser);
        graph.connect(analyser, sink);

        self.nodes = Some(GraphNodes {
            gain: gain.id(),
            analyser,
        });
        info!(sample_rate, fft_size = self.fft_size, "signal graph built");

        Ok(Some(GraphControls {
            gain,
            monitor,
            analyser: AnalyserTap::new(consumer, self.fft_size, self.smoothing),
            sample_rate,
        }))
    }

    /// Route `element` into the gain node, tapping it only if it has never
    /// been tapped. Safe to repeat: the tap is disconnected from wherever it
    /// went before, so there is always exactly one path from it.
    pub fn bind_source<E: MediaElement>(&mut self, element: &mut E) -> Result<SourceBinding, Error> {
        let nodes = self.nodes.ok_or(Error::GraphNotBuilt)?;
        let graph = self.context.graph_mut().ok_or(Error::ContextClosed)?;

        let binding = self.bindings.get_or_tap(element, graph)?;
        graph.disconnect(binding.node);
        graph.connect(binding.node, nodes.gain);
        debug!(element = ?binding.element, "source bound to gain stage");
        Ok(binding)
    }

    /// Resume, build, bind. In that order, every time playback starts.
    pub fn prepare_playback<E: MediaElement>(
        &mut self,
        element: &mut E,
        initial_gain: f32,
    ) -> Result<Option<GraphControls>, Error> {
        self.resume_if_suspended()?;
        let controls = self.build_graph_once(initial_gain)?;
        self.bind_source(element)?;
        Ok(controls)
    }

    /// Pump the graph into the output. See [`ProcessingContext::render`].
    pub fn render(&mut self) -> usize {
        if self.nodes.is_none() {
            return 0;
        }
        self.context.render()
    }

    pub fn binding(&self, element: &impl MediaElement) -> Option<SourceBinding> {
        self.bindings.get(element.id())
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn node_count(&self) -> usize {
        self.context.graph().map_or(0, |g| g.node_count())
    }

    pub fn edge_count(&self) -> usize {
        self.context.graph().map_or(0, |g| g.edge_count())
    }

    /// Where the analyser feeds, for topology checks.
    pub fn analyser_targets(&self) -> Vec<NodeId> {
        match (self.nodes, self.context.graph()) {
            (Some(nodes), Some(graph)) => graph.targets(nodes.analyser),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OfflineHost;
    use crate::media::MemoryElement;

    fn manager() -> SignalGraphManager<OfflineHost> {
        SignalGraphManager::new(OfflineHost::new(48_000, 2), &EngineConfig::default())
    }

    #[test]
    fn build_is_idempotent() {
        let mut graph = manager();
        assert!(graph.build_graph_once(1.0).unwrap().is_some());
        let nodes = graph.node_count();
        let edges = graph.edge_count();
        assert_eq!((nodes, edges), (3, 2));

        for _ in 0..5 {
            assert!(graph.build_graph_once(1.0).unwrap().is_none());
        }
        assert_eq!(graph.node_count(), nodes);
        assert_eq!(graph.edge_count(), edges);
        assert_eq!(graph.analyser_targets(), graph.context().sink().into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn build_leaves_context_suspended() {
        let mut graph = manager();
        graph.build_graph_once(1.0).unwrap();
        assert_eq!(graph.state(), ContextState::Suspended);
    }

    #[test]
    fn bind_before_build_fails() {
        let mut graph = manager();
        let mut element = MemoryElement::new();
        assert_eq!(graph.bind_source(&mut element).err(), Some(Error::GraphNotBuilt));
        assert_eq!(graph.binding_count(), 0);
    }

    #[test]
    fn rebinding_same_element_keeps_one_path() {
        let mut graph = manager();
        graph.build_graph_once(1.0).unwrap();
        let mut element = MemoryElement::new();

        let first = graph.bind_source(&mut element).unwrap();
        let edges = graph.edge_count();
        let second = graph.bind_source(&mut element).unwrap();
        let third = graph.bind_source(&mut element).unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(graph.edge_count(), edges);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.binding_count(), 1);
    }

    #[test]
    fn new_element_gets_its_own_tap() {
        let mut graph = manager();
        graph.build_graph_once(1.0).unwrap();
        let mut a = MemoryElement::new();
        let mut b = MemoryElement::new();

        graph.bind_source(&mut a).unwrap();
        graph.bind_source(&mut b).unwrap();
        assert_eq!(graph.binding_count(), 2);
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn prepare_playback_runs_full_sequence() {
        let mut graph = manager();
        let mut element = MemoryElement::new();
        let controls = graph.prepare_playback(&mut element, 2.0).unwrap();
        assert!(controls.is_some());
        assert_eq!(graph.state(), ContextState::Running);
        assert!(graph.binding(&element).is_some());

        // a suspended host is resumed before reconnecting
        graph.suspend().unwrap();
        assert!(graph.prepare_playback(&mut element, 2.0).unwrap().is_none());
        assert_eq!(graph.state(), ContextState::Running);
        assert_eq!(graph.binding_count(), 1);
    }

    #[test]
    fn unsupported_platform_surfaces_everywhere() {
        let mut graph = SignalGraphManager::new(OfflineHost::unavailable(), &EngineConfig::default());
        let mut element = MemoryElement::new();
        assert_eq!(graph.ensure_context(), Err(Error::UnsupportedPlatform));
        assert_eq!(graph.resume_if_suspended(), Err(Error::UnsupportedPlatform));
        assert!(matches!(graph.build_graph_once(1.0), Err(Error::UnsupportedPlatform)));
        assert!(matches!(graph.prepare_playback(&mut element, 1.0), Err(Error::UnsupportedPlatform)));
        assert_eq!(graph.render(), 0);
    }

    #[test]
    fn closed_context_rejects_binding() {
        let mut graph = manager();
        let mut element = MemoryElement::new();
        graph.prepare_playback(&mut element, 1.0).unwrap();
        graph.close();
        assert!(!graph.is_built());
        assert!(matches!(graph.prepare_playback(&mut element, 1.0), Err(Error::ContextClosed)));
    }
}
