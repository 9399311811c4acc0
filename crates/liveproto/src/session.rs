//! Session snapshot types.
//!
//! A snapshot is the full authoritative state of the remote session as pushed
//! by the bridge in a `session_state` message. The tree is strict containment:
//! track → devices → parameters. Every entity carries its own `path`, which is
//! the address used by deltas, acks and outbound writes.

use serde::{Deserialize, Serialize};

/// Full session state - everything the bridge knows about the live set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Regular tracks, in set order
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Return (send) tracks, in set order
    #[serde(default)]
    pub return_tracks: Vec<Track>,
    /// The master track, when the bridge reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_track: Option<Track>,
    /// Transport state, when the bridge reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
}

/// A track (regular, return, or master).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub index: u32,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub arm: bool,
    /// Normalized mixer volume (0.0 - 1.0)
    pub volume: f64,
    /// Mixer panning (-1.0 - 1.0)
    #[serde(default)]
    pub pan: f64,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// A device on a track's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub index: u32,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// A single automatable device parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub index: u32,
    pub path: String,
    pub name: String,
    /// Normalized value (0.0 - 1.0)
    pub value: f64,
    /// Human-readable value as rendered by the host ("-6.0 dB", "440 Hz")
    #[serde(default)]
    pub display: String,
}

/// Transport state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    /// Tempo in BPM
    pub tempo: f64,
    #[serde(default)]
    pub playing: bool,
    /// Song position in beats
    #[serde(default)]
    pub position: f64,
}

impl Track {
    pub fn new(index: u32, path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            path: path.into(),
            name: name.into(),
            mute: false,
            solo: false,
            arm: false,
            volume: 0.85,
            pan: 0.0,
            devices: Vec::new(),
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }
}

impl Device {
    pub fn new(index: u32, path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            path: path.into(),
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

impl Parameter {
    pub fn new(index: u32, path: impl Into<String>, name: impl Into<String>, value: f64) -> Self {
        Self {
            index,
            path: path.into(),
            name: name.into(),
            value,
            display: String::new(),
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = display.into();
        self
    }
}

impl SessionSnapshot {
    /// Every track in the set: regular tracks, then returns, then master.
    pub fn all_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks
            .iter()
            .chain(self.return_tracks.iter())
            .chain(self.master_track.iter())
    }

    pub(crate) fn all_tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks
            .iter_mut()
            .chain(self.return_tracks.iter_mut())
            .chain(self.master_track.iter_mut())
    }

    /// Look up a track by its path.
    pub fn track(&self, path: &str) -> Option<&Track> {
        self.all_tracks().find(|t| t.path == path)
    }

    /// Look up a device by its path.
    pub fn device(&self, path: &str) -> Option<&Device> {
        self.all_tracks()
            .flat_map(|t| t.devices.iter())
            .find(|d| d.path == path)
    }

    /// Look up a parameter by its path.
    pub fn parameter(&self, path: &str) -> Option<&Parameter> {
        self.all_tracks()
            .flat_map(|t| t.devices.iter())
            .flat_map(|d| d.parameters.iter())
            .find(|p| p.path == path)
    }

    /// Total number of parameters across every device.
    pub fn parameter_count(&self) -> usize {
        self.all_tracks()
            .flat_map(|t| t.devices.iter())
            .map(|d| d.parameters.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionSnapshot {
        SessionSnapshot {
            tracks: vec![Track::new(0, "track0", "Drums").with_device(
                Device::new(0, "track0.device0", "Drum Rack")
                    .with_parameter(Parameter::new(0, "track0.device0.param0", "Macro 1", 0.25)),
            )],
            return_tracks: vec![Track::new(0, "return0", "A-Reverb")],
            master_track: Some(Track::new(0, "master", "Master")),
            transport: None,
        }
    }

    #[test]
    fn test_all_tracks_order() {
        let snapshot = sample();
        let paths: Vec<&str> = snapshot.all_tracks().map(|t| t.path.as_str()).collect();
        assert_eq!(paths, vec!["track0", "return0", "master"]);
    }

    #[test]
    fn test_lookups() {
        let snapshot = sample();
        assert_eq!(snapshot.track("return0").unwrap().name, "A-Reverb");
        assert_eq!(snapshot.device("track0.device0").unwrap().name, "Drum Rack");
        assert_eq!(snapshot.parameter("track0.device0.param0").unwrap().value, 0.25);
        assert!(snapshot.parameter("track9.device0.param0").is_none());
        assert_eq!(snapshot.parameter_count(), 1);
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"tracks":[{"index":0,"path":"track0","name":"Bass","volume":0.5}]}"#;
        let snapshot: SessionSnapshot = serde_json::from_str(json).unwrap();
        let track = &snapshot.tracks[0];
        assert!(!track.mute);
        assert!(!track.arm);
        assert_eq!(track.pan, 0.0);
        assert!(track.devices.is_empty());
        assert!(snapshot.return_tracks.is_empty());
        assert!(snapshot.master_track.is_none());
    }
}
