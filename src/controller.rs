use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::{
    control_mode::{self, ControlError, ControlMode, Transition},
    ec::{EC_REG_TEMPERATURE, EcClient, EcError},
    fan_actuator::{ControllerState, FanActuator},
    fan_curve::FanIntent,
    status::{self, StatusReport},
};

// Every EC transaction goes through this lock
pub type SharedController = Arc<Mutex<Controller>>;

// The single owner of the EC and of the process wide fan state
pub struct Controller {
    actuator: FanActuator,
}

impl Controller {
    pub fn new(ec: EcClient) -> Self {
        Self {
            actuator: FanActuator::new(ec),
        }
    }

    pub fn shared(self) -> SharedController {
        Arc::new(Mutex::new(self))
    }

    pub fn mode(&self) -> ControlMode {
        self.actuator.state().last_command
    }

    pub fn state(&self) -> &ControllerState {
        self.actuator.state()
    }

    // Run one command character through the mode machine and
    // issue the writes of the resulting mode
    pub fn process_command(&mut self, command: u8) -> Result<Transition, ControlError> {
        let transition = control_mode::transition(self.mode(), command)?;

        info!(
            "Fan mode: {:?} -> {:?}",
            transition.previous, transition.mode
        );

        self.write_mode(transition.mode);

        Ok(transition)
    }

    // Process the last recognised command of a payload, the
    // rest of the payload is ignored
    pub fn process_payload(&mut self, payload: &[u8]) -> Option<Transition> {
        let mode = control_mode::scan_command(payload)?;

        self.process_command(mode.command_char()).ok()
    }

    // Issue the last command again, the EC forgets its
    // fan registers across a sleep cycle
    pub fn replay_last_command(&mut self) -> Transition {
        let mode = self.mode();

        info!("Replaying fan mode {:?}", mode);

        self.write_mode(mode);

        Transition {
            previous: mode,
            mode,
            start_scheduler: mode == ControlMode::SoftwareManaged,
        }
    }

    pub fn read_temperature(&mut self) -> Result<u8, EcError> {
        self.actuator.ec().read_register(EC_REG_TEMPERATURE)
    }

    pub fn apply_intent(&mut self, intent: FanIntent) -> Result<(), EcError> {
        self.actuator.apply_intent(intent)
    }

    // Return the fan to EC control
    pub fn set_auto(&mut self) -> Result<(), EcError> {
        self.actuator.set_auto()
    }

    pub fn read_status(&mut self) -> Result<StatusReport, EcError> {
        let state = *self.actuator.state();

        status::read_status(self.actuator.ec(), &state)
    }

    pub fn read_fan_rpm(&mut self) -> Result<u32, EcError> {
        status::read_fan_rpm(self.actuator.ec())
    }

    fn write_mode(&mut self, mode: ControlMode) {
        // The mode is recorded even when the EC rejects the write,
        // the next command or resume retries it
        if let Err(err) = self.actuator.apply_mode(mode) {
            error!("Failed to write fan mode {:?}: {}", mode, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ec::{EC_SUBCMD_FAN_MODE, EC_SUBCMD_FAN_SPEED},
        test_utils::FakeEc,
    };

    #[test]
    fn payload_uses_rightmost_command() {
        let fake = FakeEc::new();
        let mut controller = Controller::new(fake.client());

        let transition = controller.process_payload(b"xxAxxO").unwrap();

        assert_eq!(transition.mode, ControlMode::Off);
        assert_eq!(controller.mode(), ControlMode::Off);
        assert_eq!(
            fake.fan_commands(),
            vec![(EC_SUBCMD_FAN_MODE, 0x16), (EC_SUBCMD_FAN_SPEED, 0xFF)]
        );
    }

    #[test]
    fn unrecognised_payload_writes_nothing() {
        let fake = FakeEc::new();
        let mut controller = Controller::new(fake.client());

        assert!(controller.process_payload(b"hello\n").is_none());
        assert!(fake.events().is_empty());
        assert_eq!(controller.mode(), ControlMode::Auto);
    }

    #[test]
    fn invalid_command_is_reported() {
        let mut controller = Controller::new(FakeEc::new().client());

        assert_eq!(
            controller.process_command(b'z'),
            Err(ControlError::InvalidCommand('z'))
        );
    }

    #[test]
    fn replay_rewrites_software_init() {
        let fake = FakeEc::new();
        let mut controller = Controller::new(fake.client());
        controller.process_command(b'S').unwrap();
        fake.clear();

        let transition = controller.replay_last_command();

        assert!(transition.start_scheduler);
        assert_eq!(
            fake.fan_commands(),
            vec![(EC_SUBCMD_FAN_MODE, 0x16), (EC_SUBCMD_FAN_SPEED, 0x7E)]
        );
    }

    #[test]
    fn replay_of_manual_mode_does_not_start_scheduler() {
        let mut controller = Controller::new(FakeEc::new().client());
        controller.process_command(b'X').unwrap();

        let transition = controller.replay_last_command();

        assert_eq!(transition.mode, ControlMode::On);
        assert!(!transition.start_scheduler);
    }

    #[test]
    fn failed_read_reports_error() {
        let fake = FakeEc::new();
        fake.fail_reads(true);
        let mut controller = Controller::new(fake.client());

        assert!(controller.read_temperature().is_err());
        assert!(controller.read_status().is_err());
    }
}
