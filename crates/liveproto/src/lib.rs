//! liveproto - Protocol types for the liveline session bridge
//!
//! This crate defines the messages exchanged between a liveline client and the
//! bridge process that fronts the host application (the OSC/LiveAPI side).
//! The bridge is an opaque peer: it accepts intents, pushes full session
//! snapshots and scalar deltas, and answers pings.
//!
//! ## Modules
//!
//! - `session` - the snapshot tree (tracks → devices → parameters, transport)
//! - `value` - scalar leaf values
//! - `path` - leaf addressing and in-place scalar updates on a snapshot
//! - `message` - outbound [`Command`]s and inbound [`Inbound`] events
//! - `codec` - JSON text framing
//!
//! ## Deltas never change structure
//!
//! A delta only ever replaces a scalar leaf. Paths that do not resolve to
//! exactly one entity are dropped rather than creating partial trees, since the
//! bridge may reference entities this client has not loaded yet.

pub mod codec;
pub mod message;
pub mod path;
pub mod session;
pub mod value;

pub use codec::{decode, decode_frame, encode, CodecError};
pub use message::{Ack, Command, Inbound, ParameterDelta, INBOUND_KINDS};
pub use path::{ApplyOutcome, Location, TrackProperty, TransportProperty, PARAMETER_VALUE, TRANSPORT_PATH};
pub use session::{Device, Parameter, SessionSnapshot, Track, Transport};
pub use value::LiveValue;
