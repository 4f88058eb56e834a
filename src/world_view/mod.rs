//! ## World view module
//!
//! The shared view of every elevator car in the installation, and the message type
//! used to propose changes to it.
//!
//! The [ElevatorMap] is owned by a single task, see [owner]. Everybody else reads
//! snapshots from a `watch` channel with [get_map] / [update_map], and proposes a
//! complete replacement map by sending a [StateChangeMessage].

pub mod owner;

use std::fmt;

use tokio::sync::watch;


#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Direction an elevator is taking calls in.
pub enum Dirn {
    Down = -1,
    Stop = 0,
    Up = 1,
}

/// The current behaviour of an elevator, as seen by the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevatorBehaviour {
    /// Alive and ready to take work
    Idle,
    /// Travelling between floors
    Moving,
    /// Standing at a floor with the door open
    DoorOpen,
    /// Not heard from within the liveness timeout. Its work should be redistributed.
    Dead,
}

/// One elevator car in the [ElevatorMap].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevatorSlot {
    /// Slot index of the elevator
    pub id: u8,

    /// Default: [ElevatorBehaviour::Dead]
    pub behaviour: ElevatorBehaviour,

    /// Default: [Dirn::Stop]
    pub dirn: Dirn,

    /// The last floor the car passed, `None` until the FSM reports one
    pub last_floor: Option<u8>,
}

impl ElevatorSlot {
    fn new(id: u8, behaviour: ElevatorBehaviour) -> Self {
        Self {
            id,
            behaviour,
            dirn: Dirn::Stop,
            last_floor: None,
        }
    }
}

/// Error returned by [ElevatorMap] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldViewError {
    /// The slot index is outside the fixed map length
    SlotOutOfRange {
        /// Requested slot
        slot: usize,
        /// Length of the map
        len: usize,
    },
}

impl fmt::Display for WorldViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldViewError::SlotOutOfRange { slot, len } => {
                write!(f, "slot {} is outside the elevator map (len {})", slot, len)
            }
        }
    }
}

impl std::error::Error for WorldViewError {}

/// Every elevator car in the installation, indexed by slot.
///
/// The length is fixed when the map is created and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevatorMap {
    slots: Vec<ElevatorSlot>,
}

impl ElevatorMap {
    /// Creates a map with `n` slots, all marked [ElevatorBehaviour::Dead].
    pub fn new(n: usize) -> Self {
        Self {
            slots: (0..n)
                .map(|i| ElevatorSlot::new(i as u8, ElevatorBehaviour::Dead))
                .collect(),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the map has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot at `slot`, if in range.
    pub fn get(&self, slot: usize) -> Option<&ElevatorSlot> {
        self.slots.get(slot)
    }

    /// Iterates over all slots in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, ElevatorSlot> {
        self.slots.iter()
    }

    /// Sets the behaviour of one slot. Every other slot is left untouched.
    pub fn set_behaviour(&mut self, slot: usize, behaviour: ElevatorBehaviour) -> Result<(), WorldViewError> {
        let len = self.slots.len();
        match self.slots.get_mut(slot) {
            Some(s) => {
                s.behaviour = behaviour;
                Ok(())
            }
            None => Err(WorldViewError::SlotOutOfRange { slot, len }),
        }
    }

    /// Slots currently marked [ElevatorBehaviour::Dead].
    pub fn dead_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.behaviour == ElevatorBehaviour::Dead)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Why a [StateChangeMessage] was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// A registered peer started heartbeating
    NewElevator,
    /// A registered peer stopped heartbeating
    DeadElevator,
}

impl ChangeReason {
    /// Human readable reason, as carried on the message.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::NewElevator => "New elevator",
            ChangeReason::DeadElevator => "Dead elevator",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed full replacement of the [ElevatorMap], and why.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangeMessage {
    map: ElevatorMap,
    reason: ChangeReason,
}

impl StateChangeMessage {
    /// Wraps a snapshot and the reason it changed.
    pub fn new(map: ElevatorMap, reason: ChangeReason) -> Self {
        Self { map, reason }
    }

    /// The proposed map.
    pub fn map(&self) -> &ElevatorMap {
        &self.map
    }

    /// Why the map changed.
    pub fn reason(&self) -> ChangeReason {
        self.reason
    }
}


/// Fetches a clone of the latest elevator map.
///
/// The returned map is a snapshot; later updates on the watch do not affect it.
pub fn get_map(map_watch_rx: &watch::Receiver<ElevatorMap>) -> ElevatorMap {
    map_watch_rx.borrow().clone()
}

/// Refreshes `map` from the watch.
///
/// ## Returns
/// - `true` if `map` was updated, `false` otherwise.
pub fn update_map(map_watch_rx: &watch::Receiver<ElevatorMap>, map: &mut ElevatorMap) -> bool {
    let new_map = map_watch_rx.borrow();
    if *new_map != *map {
        *map = new_map.clone();
        return true;
    }
    false
}
