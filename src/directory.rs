//! Node Directory: lookup of this process's own local nodes and of
//! reachable remote nodes, filtered by capability bit.

use parking_lot::RwLock;

use crate::transport::{BROADCAST, NodeId};

/// Capability bits a directory entry can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeCapabilities {
    pub file_server: bool,
}

/// A remote (or local, self-listed) node's short identity as seen by the
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeShortName {
    pub node_id: NodeId,
    pub file_server: bool,
}

impl NodeShortName {
    /// The "not found"/"no node" sentinel.
    pub const NONE: NodeShortName = NodeShortName {
        node_id: BROADCAST,
        file_server: false,
    };

    pub fn is_none(&self) -> bool {
        self.node_id == BROADCAST
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveNode {
    short_name: NodeShortName,
}

/// Directory of this process's local nodes and the remote nodes currently
/// visible on the bus.
#[derive(Debug, Default)]
pub struct NodeDirectory {
    local_nodes: RwLock<Vec<NodeId>>,
    active: RwLock<Vec<ActiveNode>>,
}

/// Opaque cursor for [`NodeDirectory::active_nodes`] /
/// [`NodeDirectory::find_file_server`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveNodesCursor(usize);

impl NodeDirectory {
    pub fn new() -> Self {
        NodeDirectory::default()
    }

    /// Registers a local node owned by this process.
    pub fn add_local_node(&self, node_id: NodeId) {
        self.local_nodes.write().push(node_id);
    }

    /// Records (or updates) an active remote node's advertised capabilities.
    pub fn announce(&self, node_id: NodeId, capabilities: NodeCapabilities) {
        let short_name = NodeShortName {
            node_id,
            file_server: capabilities.file_server,
        };
        let mut active = self.active.write();
        if let Some(existing) = active.iter_mut().find(|n| n.short_name.node_id == node_id) {
            existing.short_name = short_name;
        } else {
            active.push(ActiveNode { short_name });
        }
    }

    /// Drops a node from the active set (it has gone offline).
    pub fn forget(&self, node_id: NodeId) {
        self.active.write().retain(|n| n.short_name.node_id != node_id);
    }

    /// Dense small index of `local_node` into this directory's local-node
    /// list, or `None` if it is not one of this process's nodes.
    pub fn my_index(&self, local_node: NodeId) -> Option<u16> {
        self.local_nodes
            .read()
            .iter()
            .position(|&n| n == local_node)
            .map(|i| i as u16)
    }

    /// Looks up a remote node's short name; `NodeShortName::NONE` if unknown.
    pub fn node_by_id(&self, id: NodeId) -> NodeShortName {
        self.active
            .read()
            .iter()
            .find(|n| n.short_name.node_id == id)
            .map(|n| n.short_name)
            .unwrap_or(NodeShortName::NONE)
    }

    /// Stateful enumeration of active nodes; returns `NodeShortName::NONE`
    /// once the cursor is exhausted.
    pub fn active_nodes(&self, cursor: &mut ActiveNodesCursor) -> NodeShortName {
        let active = self.active.read();
        match active.get(cursor.0) {
            Some(node) => {
                cursor.0 += 1;
                node.short_name
            }
            None => NodeShortName::NONE,
        }
    }

    /// Scans `active_nodes` for the first node advertising `file_server`.
    pub fn find_file_server(&self, cursor: &mut ActiveNodesCursor) -> NodeShortName {
        loop {
            let candidate = self.active_nodes(cursor);
            if candidate.is_none() || candidate.file_server {
                return candidate;
            }
        }
    }
}
