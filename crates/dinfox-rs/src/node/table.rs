// crates/dinfox-rs/src/node/table.rs
use crate::hal::DinfoxError;
use crate::types::{BoardId, NODES_LIST_SIZE_MAX, NodeAddress};
use heapless::Vec;

/// A board discovered on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    /// `None` only on a single-node bus.
    pub address: Option<NodeAddress>,
    pub board_id: BoardId,
}

impl Node {
    pub fn new(address: Option<NodeAddress>, board_id: BoardId) -> Self {
        Self { address, board_id }
    }
}

/// Ordered, capacity-bounded list of nodes in discovery order.
/// Index 0 is the local master board once a scan has run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTable {
    nodes: Vec<Node, NODES_LIST_SIZE_MAX>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        NODES_LIST_SIZE_MAX
    }

    pub fn is_full(&self) -> bool {
        self.nodes.is_full()
    }

    pub fn get(&self, index: usize) -> Result<&Node, DinfoxError> {
        self.nodes.get(index).ok_or(DinfoxError::InvalidAddress)
    }

    pub fn push(&mut self, node: Node) -> Result<(), DinfoxError> {
        self.nodes.push(node).map_err(|_| DinfoxError::BufferOverflow)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// First node of the given board type, with its index.
    pub fn find_board(&self, board_id: BoardId) -> Option<(usize, &Node)> {
        self.nodes.iter().enumerate().find(|(_, node)| node.board_id == board_id)
    }

    pub fn contains_address(&self, address: NodeAddress) -> bool {
        self.nodes.iter().any(|node| node.address == Some(address))
    }
}
