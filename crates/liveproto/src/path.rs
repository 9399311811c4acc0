//! Leaf addressing and scalar updates on a [`SessionSnapshot`].
//!
//! A delta path either names a parameter directly (`track0.device1.param3`
//! updates that parameter's value) or names an entity plus a property
//! (`track0.vol`, `transport.tempo`). Resolution matches against the `path`
//! each entity carries; it never invents structure. A path that resolves to
//! zero or several entities, or a value of the wrong type, leaves the
//! snapshot untouched.

use crate::session::SessionSnapshot;
use crate::value::LiveValue;

/// Entity path used for transport properties.
pub const TRANSPORT_PATH: &str = "transport";

/// Property name addressing a parameter's value.
pub const PARAMETER_VALUE: &str = "value";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackProperty {
    Name,
    Mute,
    Solo,
    Arm,
    Volume,
    Pan,
}

impl TrackProperty {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "name" => Some(TrackProperty::Name),
            "mute" => Some(TrackProperty::Mute),
            "solo" => Some(TrackProperty::Solo),
            "arm" => Some(TrackProperty::Arm),
            "volume" | "vol" => Some(TrackProperty::Volume),
            "pan" | "panning" => Some(TrackProperty::Pan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProperty {
    Tempo,
    Playing,
    Position,
}

impl TransportProperty {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "tempo" => Some(TransportProperty::Tempo),
            "playing" | "is_playing" => Some(TransportProperty::Playing),
            "position" | "song_time" => Some(TransportProperty::Position),
            _ => None,
        }
    }
}

/// A resolved leaf inside a snapshot.
///
/// Track slots index [`SessionSnapshot::all_tracks`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Parameter {
        track: usize,
        device: usize,
        parameter: usize,
    },
    Track {
        track: usize,
        property: TrackProperty,
    },
    Transport(TransportProperty),
}

/// Result of applying a scalar update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Exactly one leaf changed
    Applied,
    /// The leaf already held this value (and display)
    Unchanged,
    /// Nothing in the snapshot carries this path
    Unresolved,
    /// More than one entity carries this path
    Ambiguous,
    /// The value does not fit the leaf's type
    TypeMismatch,
}

impl ApplyOutcome {
    pub fn is_applied(self) -> bool {
        self == ApplyOutcome::Applied
    }
}

/// Pick the single match or report why there isn't one.
fn single<T>(mut matches: impl Iterator<Item = T>) -> Result<T, ApplyOutcome> {
    let first = matches.next().ok_or(ApplyOutcome::Unresolved)?;
    if matches.next().is_some() {
        return Err(ApplyOutcome::Ambiguous);
    }
    Ok(first)
}

impl SessionSnapshot {
    fn parameter_slots<'a>(
        &'a self,
        path: &'a str,
    ) -> impl Iterator<Item = Location> + 'a {
        self.all_tracks().enumerate().flat_map(move |(t, track)| {
            track.devices.iter().enumerate().flat_map(move |(d, device)| {
                device
                    .parameters
                    .iter()
                    .enumerate()
                    .filter(move |(_, p)| p.path == path)
                    .map(move |(p, _)| Location::Parameter {
                        track: t,
                        device: d,
                        parameter: p,
                    })
            })
        })
    }

    /// Resolve a delta path: a parameter path, or `entity.property`.
    pub fn locate_path(&self, path: &str) -> Result<Location, ApplyOutcome> {
        match single(self.parameter_slots(path)) {
            Err(ApplyOutcome::Unresolved) => {}
            found => return found,
        }
        let (entity, property) = path.rsplit_once('.').ok_or(ApplyOutcome::Unresolved)?;
        self.locate_property(entity, property)
    }

    /// Resolve an explicit `(entity, property)` pair.
    pub fn locate_property(&self, entity: &str, property: &str) -> Result<Location, ApplyOutcome> {
        if entity == TRANSPORT_PATH {
            let property = TransportProperty::parse(property).ok_or(ApplyOutcome::Unresolved)?;
            return match self.transport {
                Some(_) => Ok(Location::Transport(property)),
                None => Err(ApplyOutcome::Unresolved),
            };
        }

        if property == PARAMETER_VALUE {
            match single(self.parameter_slots(entity)) {
                Err(ApplyOutcome::Unresolved) => {}
                found => return found,
            }
        }

        let property = TrackProperty::parse(property).ok_or(ApplyOutcome::Unresolved)?;
        let track = single(
            self.all_tracks()
                .enumerate()
                .filter(|(_, t)| t.path == entity)
                .map(|(i, _)| i),
        )?;
        Ok(Location::Track { track, property })
    }

    /// Current value at a resolved location.
    pub fn value_at(&self, location: Location) -> Option<LiveValue> {
        match location {
            Location::Parameter {
                track,
                device,
                parameter,
            } => {
                let p = self
                    .all_tracks()
                    .nth(track)?
                    .devices
                    .get(device)?
                    .parameters
                    .get(parameter)?;
                Some(LiveValue::Number(p.value))
            }
            Location::Track { track, property } => {
                let t = self.all_tracks().nth(track)?;
                Some(match property {
                    TrackProperty::Name => LiveValue::Text(t.name.clone()),
                    TrackProperty::Mute => LiveValue::Bool(t.mute),
                    TrackProperty::Solo => LiveValue::Bool(t.solo),
                    TrackProperty::Arm => LiveValue::Bool(t.arm),
                    TrackProperty::Volume => LiveValue::Number(t.volume),
                    TrackProperty::Pan => LiveValue::Number(t.pan),
                })
            }
            Location::Transport(property) => {
                let transport = self.transport.as_ref()?;
                Some(match property {
                    TransportProperty::Tempo => LiveValue::Number(transport.tempo),
                    TransportProperty::Playing => LiveValue::Bool(transport.playing),
                    TransportProperty::Position => LiveValue::Number(transport.position),
                })
            }
        }
    }

    /// Read a leaf by delta path.
    pub fn value(&self, path: &str) -> Option<LiveValue> {
        self.locate_path(path)
            .ok()
            .and_then(|location| self.value_at(location))
    }

    /// Coerce `value` into the leaf's type at `location`.
    fn coerce(location: Location, value: &LiveValue) -> Option<LiveValue> {
        let numeric = || value.as_f64().map(LiveValue::Number);
        let boolean = || value.as_bool().map(LiveValue::Bool);
        match location {
            Location::Parameter { .. } => numeric(),
            Location::Track { property, .. } => match property {
                TrackProperty::Name => value.as_str().map(|s| LiveValue::Text(s.to_string())),
                TrackProperty::Mute | TrackProperty::Solo | TrackProperty::Arm => boolean(),
                TrackProperty::Volume | TrackProperty::Pan => numeric(),
            },
            Location::Transport(property) => match property {
                TransportProperty::Playing => boolean(),
                TransportProperty::Tempo | TransportProperty::Position => numeric(),
            },
        }
    }

    /// Check what applying `value`/`display` at `location` would do, without mutating.
    pub fn check_update(
        &self,
        location: Location,
        value: &LiveValue,
        display: Option<&str>,
    ) -> ApplyOutcome {
        let Some(coerced) = Self::coerce(location, value) else {
            return ApplyOutcome::TypeMismatch;
        };
        if self.value_at(location).as_ref() != Some(&coerced) {
            return ApplyOutcome::Applied;
        }
        match (location, display) {
            (Location::Parameter { .. }, Some(display)) => {
                if self.display_at(location) == Some(display) {
                    ApplyOutcome::Unchanged
                } else {
                    ApplyOutcome::Applied
                }
            }
            _ => ApplyOutcome::Unchanged,
        }
    }

    fn display_at(&self, location: Location) -> Option<&str> {
        match location {
            Location::Parameter {
                track,
                device,
                parameter,
            } => self
                .all_tracks()
                .nth(track)?
                .devices
                .get(device)?
                .parameters
                .get(parameter)
                .map(|p| p.display.as_str()),
            _ => None,
        }
    }

    /// Write `value` (and, for parameters, `display`) at `location`.
    ///
    /// Only the addressed leaf is touched. Displays are ignored for leaves
    /// that have none.
    pub fn write_at(
        &mut self,
        location: Location,
        value: &LiveValue,
        display: Option<&str>,
    ) -> ApplyOutcome {
        let Some(coerced) = Self::coerce(location, value) else {
            return ApplyOutcome::TypeMismatch;
        };
        match location {
            Location::Parameter {
                track,
                device,
                parameter,
            } => {
                let Some(p) = self
                    .all_tracks_mut()
                    .nth(track)
                    .and_then(|t| t.devices.get_mut(device))
                    .and_then(|d| d.parameters.get_mut(parameter))
                else {
                    return ApplyOutcome::Unresolved;
                };
                if let LiveValue::Number(n) = coerced {
                    p.value = n;
                }
                if let Some(display) = display {
                    p.display = display.to_string();
                }
            }
            Location::Track { track, property } => {
                let Some(t) = self.all_tracks_mut().nth(track) else {
                    return ApplyOutcome::Unresolved;
                };
                match (property, coerced) {
                    (TrackProperty::Name, LiveValue::Text(s)) => t.name = s,
                    (TrackProperty::Mute, LiveValue::Bool(b)) => t.mute = b,
                    (TrackProperty::Solo, LiveValue::Bool(b)) => t.solo = b,
                    (TrackProperty::Arm, LiveValue::Bool(b)) => t.arm = b,
                    (TrackProperty::Volume, LiveValue::Number(n)) => t.volume = n,
                    (TrackProperty::Pan, LiveValue::Number(n)) => t.pan = n,
                    _ => return ApplyOutcome::TypeMismatch,
                }
            }
            Location::Transport(property) => {
                let Some(transport) = self.transport.as_mut() else {
                    return ApplyOutcome::Unresolved;
                };
                match (property, coerced) {
                    (TransportProperty::Tempo, LiveValue::Number(n)) => transport.tempo = n,
                    (TransportProperty::Playing, LiveValue::Bool(b)) => transport.playing = b,
                    (TransportProperty::Position, LiveValue::Number(n)) => transport.position = n,
                    _ => return ApplyOutcome::TypeMismatch,
                }
            }
        }
        ApplyOutcome::Applied
    }
}
