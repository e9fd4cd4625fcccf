//! Push fan-out of vehicle updates to per-route rooms.
//!
//! One broadcast channel carries every room's events; each connection keeps
//! a membership set and forwards only the rooms it joined. Delivery is
//! at-most-once per connected subscriber (lagged receivers skip, there is no
//! replay), and events for a given vehicle keep the order in which ingests
//! reached the channel.

use std::collections::HashSet;

use tokio::sync::broadcast;

use crate::models::VehicleUpdate;

/// Clients only need the latest state, so a modest buffer suffices; slow
/// consumers lag and skip rather than queue unboundedly.
pub const CHANNEL_CAPACITY: usize = 64;

/// One emitted vehicle update addressed to a room.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    /// Room identifier, `route:<routeId>`
    pub room: String,
    pub payload: VehicleUpdate,
}

#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<RoomEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Room identifier for a route.
    pub fn room(route_id: &str) -> String {
        format!("route:{route_id}")
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.tx.subscribe()
    }

    /// Publish one update to the route's room. Send errors only mean no one
    /// is listening and are ignored.
    pub fn emit(&self, route_id: &str, payload: VehicleUpdate) {
        let event = RoomEvent {
            room: Self::room(route_id),
            payload,
        };
        let _ = self.tx.send(event);
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

/// The set of rooms one subscriber connection has joined.
///
/// `join` and `leave` are idempotent; dropping the connection drops the set,
/// which is all the cleanup room membership needs.
#[derive(Debug, Default)]
pub struct RoomMembership {
    rooms: HashSet<String>,
}

impl RoomMembership {
    /// Returns false if the room was already joined.
    pub fn join(&mut self, route_id: &str) -> bool {
        self.rooms.insert(Broadcaster::room(route_id))
    }

    pub fn leave(&mut self, route_id: &str) -> bool {
        self.rooms.remove(&Broadcaster::room(route_id))
    }

    pub fn contains(&self, room: &str) -> bool {
        self.rooms.contains(room)
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VehicleStatus;

    fn update(bus_id: &str, route_id: &str) -> VehicleUpdate {
        VehicleUpdate {
            success: true,
            bus_id: bus_id.into(),
            route_id: route_id.into(),
            snapped_location: None,
            avg_speed: 0.0,
            last_updated: None,
            eta_stops: vec![],
            status: VehicleStatus::Online,
        }
    }

    #[test]
    fn join_is_idempotent() {
        let mut membership = RoomMembership::default();
        assert!(membership.join("R1"));
        assert!(!membership.join("R1"));
        assert!(membership.contains("route:R1"));

        assert!(membership.leave("R1"));
        assert!(!membership.leave("R1"));
        assert!(membership.is_empty());
    }

    #[tokio::test]
    async fn events_reach_only_joined_rooms() {
        let broadcaster = Broadcaster::default();
        let mut rx = broadcaster.subscribe();

        let mut membership = RoomMembership::default();
        membership.join("R1");

        broadcaster.emit("R2", update("V2", "R2"));
        broadcaster.emit("R1", update("V1", "R1"));

        let mut delivered = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if membership.contains(&event.room) {
                delivered.push(event);
            }
        }

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].room, "route:R1");
        assert_eq!(delivered[0].payload.bus_id, "V1");
    }

    #[tokio::test]
    async fn per_vehicle_order_is_preserved() {
        let broadcaster = Broadcaster::default();
        let mut rx = broadcaster.subscribe();

        broadcaster.emit("R1", update("V1", "R1"));
        broadcaster.emit("R1", {
            let mut u = update("V1", "R1");
            u.avg_speed = 10.0;
            u
        });

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.payload.avg_speed, 0.0);
        assert_eq!(second.payload.avg_speed, 10.0);
    }

    #[test]
    fn emit_without_subscribers_is_a_no_op() {
        let broadcaster = Broadcaster::default();
        broadcaster.emit("R1", update("V1", "R1"));
    }
}
