use std::fmt::Write;

use crate::{
    control_mode::ControlMode,
    ec::{EC_REG_FAN_MODE, EC_REG_FAN_TACHO, EC_REG_TEMPERATURE, EcClient, EcError},
    fan_actuator::{ControllerState, FAN_MODE_HARDWARE, FAN_MODE_SOFTWARE},
};

const REPORT_TITLE: &str = "FSC AMILO XA3530 Fan control";

// Mode label derived from the EC registers, independent of the
// command that was last issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanModeLabel {
    Off,
    On,
    Software,
    Hardware,
}

impl FanModeLabel {
    pub fn from_registers(fan_mode: u8, rpm: u32) -> Self {
        if fan_mode & FAN_MODE_SOFTWARE != 0 && rpm == 0 {
            FanModeLabel::Off
        } else if fan_mode & FAN_MODE_SOFTWARE != 0 && rpm > 0 {
            FanModeLabel::Software
        } else if fan_mode & FAN_MODE_HARDWARE != 0 {
            FanModeLabel::Hardware
        } else {
            FanModeLabel::On
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FanModeLabel::Off => "Off",
            FanModeLabel::On => "On",
            FanModeLabel::Software => "Software",
            FanModeLabel::Hardware => "Hardware",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub temperature: u8,
    pub rpm: u32,
    pub fan_mode_register: u8,
    pub mode: FanModeLabel,
    pub state: ControllerState,
}

// Raw tachometer byte to RPM. The scaling is empirical.
pub fn rpm_from_tacho(raw: u8) -> u32 {
    if raw != 0 {
        (!raw) as u32 * 10
    } else {
        0
    }
}

pub fn read_fan_rpm(ec: &mut EcClient) -> Result<u32, EcError> {
    Ok(rpm_from_tacho(ec.read_register(EC_REG_FAN_TACHO)?))
}

// Sample the EC for a fresh report
pub fn read_status(
    ec: &mut EcClient,
    state: &ControllerState,
) -> Result<StatusReport, EcError> {
    let temperature = ec.read_register(EC_REG_TEMPERATURE)?;
    let fan_mode_register = ec.read_register(EC_REG_FAN_MODE)?;
    let rpm = read_fan_rpm(ec)?;

    Ok(StatusReport {
        temperature,
        rpm,
        fan_mode_register,
        mode: FanModeLabel::from_registers(fan_mode_register, rpm),
        state: *state,
    })
}

impl StatusReport {
    pub fn render(&self, debug: bool) -> String {
        let control = if self.state.last_command == ControlMode::SoftwareManaged {
            "Fan control set to software control"
        } else {
            "Fan control set to hardware control"
        };

        let mut msg = format!(
            "{REPORT_TITLE}:\n\
             \tCPU temperature: {} C\n\
             \tFan speed:       {} RPM\n\
             \tFan control:     {}\n\
             \tFan mode:        {}\n",
            self.temperature,
            self.rpm,
            control,
            self.mode.as_str(),
        );

        if debug {
            let _ = write!(
                msg,
                "\tSFAN Register:   {}\n\
                 \tLast SFAN Write: {}\n\
                 \tLast FAN Write:  {}\n\
                 \tLast Command:    {}\n",
                self.fan_mode_register,
                self.state.last_mode_byte,
                self.state.last_speed_byte,
                self.state.last_command.command_char() as char,
            );
        }

        msg
    }
}

// The report, or the error text when the EC can't be read
pub fn status_message(report: Result<StatusReport, EcError>, debug: bool) -> String {
    match report {
        Ok(report) => report.render(debug),
        Err(_) => format!(
            "{REPORT_TITLE}:\n\tError reading from embedded controller\n"
        ),
    }
}
