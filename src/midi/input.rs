//! MIDI input: opens a port through midir and forwards every raw message to
//! a [`Controller`], which maps notes onto the polyphony slots.

use midir::{MidiInput as MidirInput, MidiInputConnection};
use tracing::{debug, info};

use super::config::MidiConfig;
use crate::session::Controller;

const CLIENT_NAME: &str = "glitch";

/// MIDI input errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MidiError {
    /// The MIDI backend could not be initialised.
    Init(String),
    /// The system reports no input ports at all.
    NoPorts,
    /// No port name contains the configured device name.
    DeviceNotFound(String),
    /// Opening the selected port failed.
    Connect(String),
}

impl std::fmt::Display for MidiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MidiError::Init(e) => write!(f, "MIDI init error: {e}"),
            MidiError::NoPorts => write!(f, "no MIDI input ports available"),
            MidiError::DeviceNotFound(name) => {
                write!(f, "no MIDI input device matching '{name}'")
            }
            MidiError::Connect(e) => write!(f, "MIDI connect error: {e}"),
        }
    }
}

impl std::error::Error for MidiError {}

/// Pick the port to open from the available port names.
///
/// With a device name, the first port whose name contains it (ignoring
/// case) wins; without one, the first port.
pub fn select_port(names: &[String], device_name: Option<&str>) -> Result<usize, MidiError> {
    if names.is_empty() {
        return Err(MidiError::NoPorts);
    }
    let Some(wanted) = device_name else {
        return Ok(0);
    };
    let wanted_lower = wanted.to_lowercase();
    names
        .iter()
        .position(|name| name.to_lowercase().contains(&wanted_lower))
        .ok_or_else(|| MidiError::DeviceNotFound(wanted.to_string()))
}

/// An open MIDI input port. Dropping it closes the port.
pub struct MidiInput {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiInput {
    /// Open the port selected by `config` and route its messages to
    /// `controller`, honouring the configured channel filter.
    pub fn start(config: &MidiConfig, controller: Controller) -> Result<Self, MidiError> {
        let midi_in = MidirInput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;

        let ports = midi_in.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_default())
            .collect();
        debug!(?names, "MIDI input ports");
        let index = select_port(&names, config.device_name.as_deref())?;
        let port_name = names[index].clone();

        let channel_filter = config.channel_filter;
        let connection = midi_in
            .connect(
                &ports[index],
                "glitch-notes",
                move |_stamp, message, _| controller.midi_message(message, channel_filter),
                (),
            )
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        info!(port = %port_name, ?channel_filter, "MIDI input connected");
        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Names of all MIDI input ports, empty when the backend is unavailable.
    pub fn list_devices() -> Vec<String> {
        match MidirInput::new(CLIENT_NAME) {
            Ok(midi_in) => midi_in
                .ports()
                .iter()
                .filter_map(|p| midi_in.port_name(p).ok())
                .collect(),
            Err(e) => {
                debug!("MIDI backend unavailable: {e}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_ports_is_an_error() {
        assert_eq!(select_port(&[], None), Err(MidiError::NoPorts));
        assert_eq!(select_port(&[], Some("keys")), Err(MidiError::NoPorts));
    }

    #[test]
    fn first_port_without_device_name() {
        let ports = names(&["Midi Through:0", "Keystation 49:0"]);
        assert_eq!(select_port(&ports, None), Ok(0));
    }

    #[test]
    fn device_name_matches_substring_ignoring_case() {
        let ports = names(&["Midi Through:0", "Keystation 49:0", "Keystation 88:0"]);
        assert_eq!(select_port(&ports, Some("keystation")), Ok(1));
        assert_eq!(select_port(&ports, Some("88")), Ok(2));
    }

    #[test]
    fn unknown_device_name_is_reported() {
        let ports = names(&["Midi Through:0"]);
        let err = select_port(&ports, Some("Launchkey")).unwrap_err();
        assert_eq!(err, MidiError::DeviceNotFound("Launchkey".to_string()));
        assert_eq!(err.to_string(), "no MIDI input device matching 'Launchkey'");
    }

    #[test]
    #[ignore] // Requires a MIDI input device: run manually with `cargo test -- --ignored`
    fn connects_to_first_device() {
        let controller = crate::session::Session::new(8000, 1).controller();
        let input = MidiInput::start(&MidiConfig::default(), controller).expect("no MIDI device");
        assert!(MidiInput::list_devices().contains(&input.port_name().to_string()));
    }
}
