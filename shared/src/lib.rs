//! Types shared by the match server and its clients: the JSON wire protocol,
//! the replicated match state and the static house geometry.

pub mod math;
pub mod protocol;
pub mod state;
pub mod world;

pub use math::Vec3;
pub use protocol::{ClientMessage, Envelope, MessageKinds, ProtocolError, ServerMessage};
pub use state::{
    CharType, DisasterKind, Door, FuseBox, KillerType, KillerView, MatchPhase, MatchState,
    Survivor, SurvivorStatus, Throwable, Winner, FUSE_BOXES_TO_WIN, KILLER_PLACEHOLDER,
    MAX_REPAIR_PROGRESS, WATER_BASELINE,
};
pub use world::{Furniture, FurnitureKind, HidingSpot, Slab, WorldData};

/// Largest datagram either side will try to read.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
/// Default room joined when `joinRoom` names none.
pub const DEFAULT_ROOM_ID: &str = "default";
