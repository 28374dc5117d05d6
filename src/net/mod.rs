//! Network-facing records and the dispatch seam

pub mod dispatch;
pub mod protocol;

pub use dispatch::{ChannelDispatcher, Dispatch, DispatchError, RecordingDispatcher};
pub use protocol::{DamageSource, Element, InboundEvent, Movement, OutboundRecord};
