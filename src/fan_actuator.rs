use tracing::debug;

use crate::{
    control_mode::ControlMode,
    ec::{EC_SUBCMD_FAN_MODE, EC_SUBCMD_FAN_SPEED, EcClient, EcError},
    fan_curve::{
        BASELINE_SPEED_OFFSET, CRITICAL_SPEED_OFFSET, FanIntent,
        FanSpeedOffset, STOPPED_SPEED_OFFSET,
    },
};

// Values written to the fan mode sub-register
pub const FAN_MODE_SOFTWARE: u8 = 0x16;
pub const FAN_MODE_HARDWARE: u8 = 0x04;

// What the actuator last did, used by resume and status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    pub last_command: ControlMode,
    pub last_mode_byte: u8,
    pub last_speed_byte: u8,
}

impl Default for ControllerState {
    fn default() -> Self {
        // Hardware control until the first command
        Self {
            last_command: ControlMode::Auto,
            last_mode_byte: 0,
            last_speed_byte: 0,
        }
    }
}

// Turns fan intents into EC write sequences
pub struct FanActuator {
    ec: EcClient,
    state: ControllerState,
}

impl FanActuator {
    pub fn new(ec: EcClient) -> Self {
        Self {
            ec,
            state: ControllerState::default(),
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn ec(&mut self) -> &mut EcClient {
        &mut self.ec
    }

    // Issue the full write sequence of a mode
    pub fn apply_mode(&mut self, mode: ControlMode) -> Result<(), EcError> {
        match mode {
            ControlMode::Off => self.set_disabled(),
            ControlMode::On => self.set_enabled(),
            ControlMode::Auto => self.set_auto(),
            ControlMode::SoftwareManaged => self.set_software(),
        }
    }

    pub fn apply_intent(&mut self, intent: FanIntent) -> Result<(), EcError> {
        match intent {
            FanIntent::Disable => self.set_disabled(),
            FanIntent::Critical => self.set_critical(),
            FanIntent::Speed(offset) => self.set_speed(offset),
        }
    }

    // Stop the fan
    pub fn set_disabled(&mut self) -> Result<(), EcError> {
        debug!("Fan set to disabled");
        self.write_mode(ControlMode::Off, FAN_MODE_SOFTWARE, STOPPED_SPEED_OFFSET)
    }

    // Manual on, start with the lowest speed
    pub fn set_enabled(&mut self) -> Result<(), EcError> {
        debug!("Fan set to enabled");
        self.write_mode(ControlMode::On, FAN_MODE_HARDWARE, BASELINE_SPEED_OFFSET)
    }

    // Hand control back to the EC, a baseline speed is still written
    pub fn set_auto(&mut self) -> Result<(), EcError> {
        debug!("Fan set to auto mode");
        self.write_mode(ControlMode::Auto, FAN_MODE_HARDWARE, BASELINE_SPEED_OFFSET)
    }

    // Software ramping, start with the lowest speed
    pub fn set_software(&mut self) -> Result<(), EcError> {
        debug!("Fan set to software control");
        self.write_mode(
            ControlMode::SoftwareManaged,
            FAN_MODE_SOFTWARE,
            BASELINE_SPEED_OFFSET,
        )
    }

    pub fn set_critical(&mut self) -> Result<(), EcError> {
        debug!("Fan set to critical");
        self.write_speed(CRITICAL_SPEED_OFFSET)
    }

    pub fn set_speed(&mut self, offset: FanSpeedOffset) -> Result<(), EcError> {
        self.write_speed(offset.get())
    }

    fn write_mode(
        &mut self,
        command: ControlMode,
        mode_byte: u8,
        speed_byte: u8,
    ) -> Result<(), EcError> {
        self.state.last_command = command;
        self.state.last_mode_byte = mode_byte;

        self.ec.send_fan_command(EC_SUBCMD_FAN_MODE, mode_byte)?;
        self.write_speed(speed_byte)
    }

    fn write_speed(&mut self, speed_byte: u8) -> Result<(), EcError> {
        self.state.last_speed_byte = speed_byte;

        self.ec.send_fan_command(EC_SUBCMD_FAN_SPEED, speed_byte)
    }
}
