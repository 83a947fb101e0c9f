//! MIDI message mapping: raw status/data bytes to note events.

/// What a raw MIDI message means to the polyphony bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    /// Any other status byte. Passed through so the caller can log it.
    Other { status: u8, data1: u8, data2: u8 },
}

/// Parse a channel voice message.
///
/// - Note On:  `[0x90 | channel, note, velocity]` (velocity 0 means Note Off)
/// - Note Off: `[0x80 | channel, note, velocity]`
///
/// Returns `None` when `channel_filter` is set and the message is on another
/// channel.
pub fn parse_midi_message(
    status: u8,
    data1: u8,
    data2: u8,
    channel_filter: Option<u8>,
) -> Option<MidiEvent> {
    let channel = status & 0x0F;
    if let Some(filter) = channel_filter {
        if channel != filter {
            return None;
        }
    }

    let event = match status & 0xF0 {
        0x90 if data2 > 0 => MidiEvent::NoteOn {
            note: data1,
            velocity: data2,
        },
        0x90 | 0x80 => MidiEvent::NoteOff { note: data1 },
        _ => MidiEvent::Other {
            status,
            data1,
            data2,
        },
    };
    Some(event)
}

/// Parse a message as delivered by a MIDI input callback.
///
/// Short messages are padded with zeros; empty ones are ignored.
pub fn apply_midi_message(msg: &[u8], channel_filter: Option<u8>) -> Option<MidiEvent> {
    let (&status, data) = msg.split_first()?;
    let data1 = data.first().copied().unwrap_or(0);
    let data2 = data.get(1).copied().unwrap_or(0);
    parse_midi_message(status, data1, data2, channel_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on() {
        assert_eq!(
            parse_midi_message(0x90, 69, 100, None),
            Some(MidiEvent::NoteOn {
                note: 69,
                velocity: 100
            })
        );
    }

    #[test]
    fn note_on_velocity_zero_is_note_off() {
        assert_eq!(
            parse_midi_message(0x90, 60, 0, None),
            Some(MidiEvent::NoteOff { note: 60 })
        );
    }

    #[test]
    fn note_off() {
        assert_eq!(
            parse_midi_message(0x80, 60, 64, None),
            Some(MidiEvent::NoteOff { note: 60 })
        );
    }

    #[test]
    fn any_channel_matches_without_filter() {
        assert_eq!(
            parse_midi_message(0x9A, 40, 1, None),
            Some(MidiEvent::NoteOn {
                note: 40,
                velocity: 1
            })
        );
        assert_eq!(
            parse_midi_message(0x8F, 40, 0, None),
            Some(MidiEvent::NoteOff { note: 40 })
        );
    }

    #[test]
    fn channel_filter() {
        assert!(parse_midi_message(0x91, 60, 100, Some(0)).is_none());
        assert!(parse_midi_message(0x90, 60, 100, Some(0)).is_some());
    }

    #[test]
    fn other_status_passes_through() {
        assert_eq!(
            parse_midi_message(0xB0, 1, 64, None),
            Some(MidiEvent::Other {
                status: 0xB0,
                data1: 1,
                data2: 64
            })
        );
    }

    #[test]
    fn raw_message_padding() {
        assert_eq!(apply_midi_message(&[], None), None);
        assert_eq!(
            apply_midi_message(&[0xC0, 5], None),
            Some(MidiEvent::Other {
                status: 0xC0,
                data1: 5,
                data2: 0
            })
        );
        assert_eq!(
            apply_midi_message(&[0x80, 61, 0], None),
            Some(MidiEvent::NoteOff { note: 61 })
        );
    }
}
