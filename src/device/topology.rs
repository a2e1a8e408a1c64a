//! Device hierarchy: declared parent links and derived child tables.
//!
//! Devices only declare their parents. The child → latency tables are
//! derived once, when the orchestrator registers the topology.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::id::DeviceId;
use super::traits::FogDevice;

/// An uplink to a parent device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    pub parent: DeviceId,
    /// Link latency in ticks.
    pub latency: u64,
}

/// A device's place in the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceLinks {
    parents: Vec<ParentLink>,
    children: BTreeMap<DeviceId, u64>,
}

impl DeviceLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links with a single declared parent.
    pub fn with_parent(parent: DeviceId, latency: u64) -> Self {
        let mut links = DeviceLinks::new();
        links.add_parent(parent, latency);
        links
    }

    pub fn add_parent(&mut self, parent: DeviceId, latency: u64) {
        self.parents.push(ParentLink { parent, latency });
    }

    pub fn parents(&self) -> &[ParentLink] {
        &self.parents
    }

    /// The primary uplink (first declared parent).
    pub fn uplink(&self) -> Option<ParentLink> {
        self.parents.first().copied()
    }

    /// Child → latency table.
    pub fn children(&self) -> &BTreeMap<DeviceId, u64> {
        &self.children
    }

    pub fn child_latency(&self, child: DeviceId) -> Option<u64> {
        self.children.get(&child).copied()
    }

    pub fn add_child(&mut self, child: DeviceId, latency: u64) {
        self.children.insert(child, latency);
    }

    pub fn clear_children(&mut self) {
        self.children.clear();
    }
}

/// Derive every device's child table from the others' parent links.
///
/// A link to an unregistered parent is dropped with a warning. Running
/// this again rebuilds the tables from scratch.
pub fn connect_with_latencies(devices: &mut BTreeMap<DeviceId, Box<dyn FogDevice>>) {
    let links: Vec<(DeviceId, ParentLink)> = devices
        .iter()
        .flat_map(|(id, device)| device.parent_links().iter().map(move |link| (*id, *link)))
        .collect();

    for device in devices.values_mut() {
        device.links_mut().clear_children();
    }

    for (child, link) in links {
        match devices.get_mut(&link.parent) {
            Some(parent) => parent.links_mut().add_child(child, link.latency),
            None => warn!(
                child = %child,
                parent = %link.parent,
                "parent device not registered; link dropped"
            ),
        }
    }
}

/// Latency of the path between two devices through their closest common
/// ancestor, following primary uplinks. `None` if they share no ancestor.
pub fn path_latency(
    devices: &BTreeMap<DeviceId, Box<dyn FogDevice>>,
    from: DeviceId,
    to: DeviceId,
) -> Option<u64> {
    let up_from = ancestry(devices, from);
    let up_to = ancestry(devices, to);
    up_from.iter().find_map(|(id, a)| {
        up_to
            .iter()
            .find(|(other, _)| other == id)
            .map(|(_, b)| a + b)
    })
}

/// `start` and its registered ancestors, each with the cumulative uplink
/// latency from `start`.
fn ancestry(
    devices: &BTreeMap<DeviceId, Box<dyn FogDevice>>,
    start: DeviceId,
) -> Vec<(DeviceId, u64)> {
    let mut chain = vec![(start, 0)];
    let mut current = start;
    let mut total = 0;
    while let Some(link) = devices.get(&current).and_then(|d| d.links().uplink()) {
        if !devices.contains_key(&link.parent) || chain.iter().any(|(id, _)| *id == link.parent) {
            break;
        }
        total += link.latency;
        current = link.parent;
        chain.push((current, total));
    }
    chain
}
