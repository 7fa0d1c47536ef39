//! Source bindings: which graph node taps which media element.

use hashbrown::HashMap;
use tracing::{debug, error};

use crate::error::Error;
use crate::graph::AudioGraph;
use crate::media::{ElementId, MediaElement};
use crate::node::NodeId;

/// One element's tap inside the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceBinding {
    pub element: ElementId,
    pub node: NodeId,
}

/// Cache of bindings keyed by element identity.
///
/// Entries live as long as the processing context; there is no eviction.
/// Looking up the cache before tapping is what keeps an element from ever
/// being tapped twice.
#[derive(Debug, Default)]
pub struct SourceBindings {
    bindings: HashMap<ElementId, SourceBinding>,
}

impl SourceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, element: ElementId) -> Option<SourceBinding> {
        self.bindings.get(&element).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The cached binding for `element`, or a fresh tap added to `graph`.
    pub fn get_or_tap<E: MediaElement>(
        &mut self,
        element: &mut E,
        graph: &mut AudioGraph,
    ) -> Result<SourceBinding, Error> {
        let id = element.id();
        if let Some(binding) = self.get(id) {
            debug!(element = ?id, "reusing source binding");
            return Ok(binding);
        }

        let tap = element.tap().map_err(|e| {
            error!(element = ?id, "element was tapped outside the binding cache: {e}");
            e
        })?;
        let node = graph.add(tap).id();
        let binding = SourceBinding { element: id, node };
        self.bindings.insert(id, binding);
        debug!(element = ?id, node = ?node, "tapped media element");
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MemoryElement;

    #[test]
    fn same_element_taps_once() {
        let mut graph = AudioGraph::new(48_000);
        let mut bindings = SourceBindings::new();
        let mut element = MemoryElement::new();

        let first = bindings.get_or_tap(&mut element, &mut graph).unwrap();
        let second = bindings.get_or_tap(&mut element, &mut graph).unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn distinct_elements_get_distinct_taps() {
        let mut graph = AudioGraph::new(48_000);
        let mut bindings = SourceBindings::new();
        let mut a = MemoryElement::new();
        let mut b = MemoryElement::new();

        let ba = bindings.get_or_tap(&mut a, &mut graph).unwrap();
        let bb = bindings.get_or_tap(&mut b, &mut graph).unwrap();
        assert_ne!(ba.node, bb.node);
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn tap_taken_elsewhere_is_a_bind_conflict() {
        let mut graph = AudioGraph::new(48_000);
        let mut bindings = SourceBindings::new();
        let mut element = MemoryElement::new();
        let _stolen = element.tap().unwrap();

        let err = bindings.get_or_tap(&mut element, &mut graph).unwrap_err();
        assert_eq!(err, Error::BindConflict(element.id()));
        assert!(bindings.is_empty());
        assert_eq!(graph.node_count(), 0);
    }
}
