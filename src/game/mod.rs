//! Game simulation modules

pub mod combat;
pub mod drop;
pub mod input;
pub mod mob;
pub mod pet;
pub mod player;
pub mod session;
pub mod snapshot;
pub mod stats;
pub mod world;

pub use input::{KeyAction, KeyInput};
pub use mob::{Mob, MobCatalog, MobData};
pub use player::{CharState, Player, PlayerEvent};
pub use session::{Session, SessionHandle, SessionInput};
pub use snapshot::{FrameSnapshot, SnapshotBuilder};
pub use stats::CharStats;
pub use world::World;
