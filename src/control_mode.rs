use thiserror::Error;

// Command characters accepted on the command channel
pub const FAN_ON_CHAR: u8 = b'X';
pub const FAN_OFF_CHAR: u8 = b'O';
pub const FAN_AUTO_CHAR: u8 = b'A';
pub const FAN_SOFTWARE_CHAR: u8 = b'S';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("Invalid fan command: {0:?}")]
    InvalidCommand(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Off,
    On,
    Auto,
    SoftwareManaged,
}

impl ControlMode {
    pub fn command_char(self) -> u8 {
        match self {
            ControlMode::Off => FAN_OFF_CHAR,
            ControlMode::On => FAN_ON_CHAR,
            ControlMode::Auto => FAN_AUTO_CHAR,
            ControlMode::SoftwareManaged => FAN_SOFTWARE_CHAR,
        }
    }
}

impl TryFrom<u8> for ControlMode {
    type Error = ControlError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            FAN_OFF_CHAR => Ok(ControlMode::Off),
            FAN_ON_CHAR => Ok(ControlMode::On),
            FAN_AUTO_CHAR => Ok(ControlMode::Auto),
            FAN_SOFTWARE_CHAR => Ok(ControlMode::SoftwareManaged),
            other => Err(ControlError::InvalidCommand(other as char)),
        }
    }
}

// Outcome of a mode change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: ControlMode,
    pub mode: ControlMode,
    // The thermal scheduler must be created and armed
    pub start_scheduler: bool,
}

// Apply a command character to the current mode.
// The new mode always re-issues its writes, even when unchanged.
pub fn transition(
    previous: ControlMode,
    command: u8,
) -> Result<Transition, ControlError> {
    let mode = ControlMode::try_from(command)?;

    Ok(Transition {
        previous,
        mode,
        start_scheduler: mode == ControlMode::SoftwareManaged
            && previous != ControlMode::SoftwareManaged,
    })
}

// Only the last recognised command character of a payload counts,
// scan from the end and stop at the first match
pub fn scan_command(payload: &[u8]) -> Option<ControlMode> {
    payload
        .iter()
        .rev()
        .find_map(|byte| ControlMode::try_from(*byte).ok())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(b"xxAxxO", Some(ControlMode::Off); "rightmost wins")]
    #[test_case(b"S\n", Some(ControlMode::SoftwareManaged); "trailing newline")]
    #[test_case(b"X", Some(ControlMode::On))]
    #[test_case(b"A  ", Some(ControlMode::Auto))]
    #[test_case(b"hello", None; "nothing recognised")]
    #[test_case(b"", None; "empty")]
    #[test_case(b"s", None; "lower case rejected")]
    fn scan_payload(payload: &[u8], expected: Option<ControlMode>) {
        assert_eq!(scan_command(payload), expected);
    }

    #[test]
    fn invalid_character_is_rejected() {
        assert_eq!(
            transition(ControlMode::Auto, b'Q'),
            Err(ControlError::InvalidCommand('Q'))
        );
    }

    #[test]
    fn entering_software_starts_scheduler() {
        for previous in [ControlMode::Off, ControlMode::On, ControlMode::Auto] {
            let t = transition(previous, b'S').unwrap();

            assert_eq!(t.mode, ControlMode::SoftwareManaged);
            assert!(t.start_scheduler);
        }
    }

    #[test]
    fn staying_in_software_does_not_restart() {
        let t = transition(ControlMode::SoftwareManaged, b'S').unwrap();

        assert_eq!(t.mode, ControlMode::SoftwareManaged);
        assert!(!t.start_scheduler);
    }

    #[test]
    fn other_modes_never_start_scheduler() {
        for command in [b'X', b'O', b'A'] {
            let t = transition(ControlMode::SoftwareManaged, command).unwrap();
            assert!(!t.start_scheduler);
        }
    }

    #[test]
    fn command_chars_round_trip() {
        for mode in [
            ControlMode::Off,
            ControlMode::On,
            ControlMode::Auto,
            ControlMode::SoftwareManaged,
        ] {
            assert_eq!(ControlMode::try_from(mode.command_char()), Ok(mode));
        }
    }
}
