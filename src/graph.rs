//! Audio graph - owns nodes and message queues

use core::marker::PhantomData;

use dasp_graph::{Buffer, Input, NodeData, Processor};
use hashbrown::HashMap;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::debug;

use crate::node::{AudioNode, NodeId, ProcessContext, BLOCK_SIZE};

/// Handle to send messages to a node in an [`AudioGraph`].
pub struct NodeHandle<M: Send + 'static> {
    pub(crate) id: NodeId,
    pub(crate) sender: Producer<M>,
    pub(crate) _marker: PhantomData<M>,
}

impl<M: Send + 'static> NodeHandle<M> {
    /// Send a message to the node (applied next process cycle)
    ///
    /// Returns `Err(msg)` if the queue is full.
    pub fn send(&mut self, msg: M) -> Result<(), M> {
        self.sender.push(msg).map_err(|rtrb::PushError::Full(v)| v)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

// Type-erased wrapper so we can store heterogeneous nodes
trait ErasedNode: Send {
    fn process_erased(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]);
}

struct NodeWrapper<N: AudioNode> {
    node: N,
    receiver: Consumer<N::Message>,
}

impl<N: AudioNode> ErasedNode for NodeWrapper<N> {
    fn process_erased(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]) {
        // Split borrow to avoid conflict between receiver and node
        let receiver = &mut self.receiver;
        let node = &mut self.node;

        let messages = core::iter::from_fn(|| receiver.pop().ok());
        node.process(ctx, messages, inputs, outputs);
    }
}

// Adapter for dasp_graph
struct DaspAdapter {
    node: Box<dyn ErasedNode>,
    ctx: ProcessContext,
}

impl dasp_graph::Node for DaspAdapter {
    fn process(&mut self, inputs: &[Input], outputs: &mut [Buffer]) {
        self.node.process_erased(&self.ctx, inputs, outputs);
    }
}

type InnerGraph = petgraph::graph::Graph<NodeData<DaspAdapter>, ()>;

/// An audio processing graph at a fixed sample rate.
///
/// Nodes are only ever added, never removed: the player graph is built once
/// and source taps live as long as the context. Edges can be removed so a
/// tap can be re-routed without duplicating its audible path.
pub struct AudioGraph {
    graph: InnerGraph,
    processor: Processor<InnerGraph>,
    ctx: ProcessContext,

    node_indices: HashMap<NodeId, NodeIndex>,
    next_node_id: u32,

    terminal: Option<NodeIndex>,
}

impl AudioGraph {
    /// Create a new graph with the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            graph: InnerGraph::with_capacity(16, 16),
            processor: Processor::with_capacity(16),
            ctx: ProcessContext {
                sample_rate,
                buffer_size: BLOCK_SIZE,
            },
            node_indices: HashMap::new(),
            next_node_id: 0,
            terminal: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.ctx.sample_rate
    }

    /// Add a node, returns a handle for sending messages
    pub fn add<N: AudioNode>(&mut self, node: N) -> NodeHandle<N::Message> {
        self.add_with_queue_size(node, 64)
    }

    /// Add a node with a custom message queue size
    pub fn add_with_queue_size<N: AudioNode>(&mut self, node: N, queue_size: usize) -> NodeHandle<N::Message> {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        let (producer, consumer) = RingBuffer::new(queue_size);

        let num_outputs = node.num_outputs();
        let wrapper = NodeWrapper { node, receiver: consumer };
        let adapter = DaspAdapter {
            node: Box::new(wrapper),
            ctx: self.ctx,
        };

        let node_data = match num_outputs {
            2 => NodeData::new2(adapter),
            // 0 outputs = sink, but dasp_graph still needs a buffer for inputs
            _ => NodeData::new1(adapter),
        };

        let idx = self.graph.add_node(node_data);
        self.node_indices.insert(id, idx);
        debug!(node = id.0, "added node");

        NodeHandle {
            id,
            sender: producer,
            _marker: PhantomData,
        }
    }

    /// Connect output of `from` to input of `to`
    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        let from_idx = self.node_indices[&from];
        let to_idx = self.node_indices[&to];
        self.graph.add_edge(from_idx, to_idx, ());
        debug!(from = from.0, to = to.0, "connected");
    }

    /// Remove every outgoing edge of `node`. Returns how many were removed.
    ///
    /// Disconnecting a node with no outputs is a no-op, never an error.
    pub fn disconnect(&mut self, node: NodeId) -> usize {
        let idx = self.node_indices[&node];
        let mut removed = 0;
        while let Some(edge) = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .next()
            .map(|e| e.id())
        {
            self.graph.remove_edge(edge);
            removed += 1;
        }
        if removed > 0 {
            debug!(node = node.0, removed, "disconnected");
        }
        removed
    }

    /// Ids of the nodes `node` feeds into.
    pub fn targets(&self, node: NodeId) -> Vec<NodeId> {
        let idx = self.node_indices[&node];
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .filter_map(|target| {
                self.node_indices
                    .iter()
                    .find(|(_, i)| **i == target)
                    .map(|(id, _)| *id)
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Set which node to process to (typically a sink)
    pub fn set_terminal(&mut self, node: NodeId) {
        self.terminal = Some(self.node_indices[&node]);
    }

    /// Process one block of audio through the graph
    pub fn process(&mut self) {
        if let Some(terminal) = self.terminal {
            self.processor.process(&mut self.graph, terminal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pass;

    impl AudioNode for Pass {
        type Message = ();

        fn process(
            &mut self,
            _ctx: &ProcessContext,
            _messages: impl Iterator<Item = ()>,
            _inputs: &[Input],
            _outputs: &mut [Buffer],
        ) {
        }
    }

    #[test]
    fn disconnect_removes_only_outgoing_edges() {
        let mut graph = AudioGraph::new(48_000);
        let a = graph.add(Pass).id();
        let b = graph.add(Pass).id();
        let c = graph.add(Pass).id();

        graph.connect(a, b);
        graph.connect(a, c);
        graph.connect(b, c);
        assert_eq!(graph.edge_count(), 3);

        assert_eq!(graph.disconnect(a), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.targets(b), vec![c]);

        // nothing left to remove
        assert_eq!(graph.disconnect(a), 0);
    }

    #[test]
    fn processing_without_terminal_is_noop() {
        let mut graph = AudioGraph::new(44_100);
        graph.add(Pass);
        graph.process();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.sample_rate(), 44_100);
    }
}
