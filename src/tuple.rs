//! Tuples: the data units that flow between application modules.

use serde::{Deserialize, Serialize};

use crate::application::AppEdge;

/// Which way a tuple travels through the device hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards the cloud (child → parent).
    Up,
    /// Towards the edge (parent → child).
    Down,
    /// Addressed to an actuator.
    Actuator,
}

/// Who produced a tuple.
///
/// Sensor tuples are sources, not work waiting on a processor; backlog
/// accounting on the global queue skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TupleOrigin {
    Sensor,
    Module,
}

/// A data unit in flight or waiting in a device queue.
///
/// Tuples are ephemeral: their CPU start times live in the
/// [`TimeTracker`](crate::tracker::TimeTracker), and once a tuple has
/// fed the running aggregates nothing about it is retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    /// Unique id minted by `TimeTracker::next_id`.
    pub id: u64,
    /// Application the tuple belongs to.
    pub app_id: String,
    pub tuple_type: String,
    /// Emitting module, or the sensor tuple type for sensor tuples.
    pub src_module: String,
    /// Module this tuple is addressed to.
    pub dest_module: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Processing demand at the destination.
    pub cpu_length: u64,
    pub direction: Direction,
    pub origin: TupleOrigin,
    /// Id of the sensor tuple this one descends from.
    pub root_id: u64,
}

impl Tuple {
    /// A fresh sensor tuple travelling along a SENSOR edge.
    pub fn from_sensor(id: u64, app_id: &str, edge: &AppEdge) -> Self {
        Tuple {
            id,
            app_id: app_id.to_string(),
            tuple_type: edge.tuple_type.clone(),
            src_module: edge.source.clone(),
            dest_module: edge.destination.clone(),
            size: edge.data_size,
            cpu_length: edge.cpu_length,
            direction: edge.direction,
            origin: TupleOrigin::Sensor,
            root_id: id,
        }
    }

    /// A tuple emitted by a module while processing `parent`.
    pub fn derived(id: u64, parent: &Tuple, edge: &AppEdge) -> Self {
        Tuple {
            id,
            app_id: parent.app_id.clone(),
            tuple_type: edge.tuple_type.clone(),
            src_module: edge.source.clone(),
            dest_module: edge.destination.clone(),
            size: edge.data_size,
            cpu_length: edge.cpu_length,
            direction: edge.direction,
            origin: TupleOrigin::Module,
            root_id: parent.root_id,
        }
    }

    /// Whether this tuple was emitted by a sensor.
    pub fn is_from_sensor(&self) -> bool {
        self.origin == TupleOrigin::Sensor
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} ({} → {}, {} B)",
            self.id, self.tuple_type, self.src_module, self.dest_module, self.size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{AppEdge, EdgeKind};

    #[test]
    fn test_derived_keeps_root() {
        let sensor_edge = AppEdge::new("TEMP", "filter", "TEMP", EdgeKind::Sensor).data_size(500);
        let module_edge = AppEdge::new("filter", "store", "FILTERED", EdgeKind::Module).data_size(200);

        let root = Tuple::from_sensor(7, "app", &sensor_edge);
        assert!(root.is_from_sensor());
        assert_eq!(root.root_id, 7);
        assert_eq!(root.size, 500);

        let child = Tuple::derived(8, &root, &module_edge);
        assert!(!child.is_from_sensor());
        assert_eq!(child.root_id, 7);
        assert_eq!(child.src_module, "filter");
        assert_eq!(child.dest_module, "store");
        assert_eq!(child.size, 200);
    }
}
