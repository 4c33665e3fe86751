use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{trace, warn};

pub mod port_io;

use port_io::{DebugfsRegisters, DevPort, EcRegisters, PortIo};

// I/O ports of the embedded controller
pub const EC_COMMAND_PORT: u16 = 0x66;
pub const EC_DATA_PORT: u16 = 0x62;

// Status bit on the command port, set while the EC is busy
pub const EC_STATUS_BUSY: u8 = 0x02;
// Poll budget of the busy-wait before writing anyway
pub const EC_WAIT_ATTEMPTS: u16 = 0x4000;

// Fan command and its two sub-commands
pub const EC_CMD_FAN: u8 = 0x81;
pub const EC_SUBCMD_FAN_MODE: u8 = 0x93;
pub const EC_SUBCMD_FAN_SPEED: u8 = 0x94;

// EC register addresses
pub const EC_REG_TEMPERATURE: u8 = 169;
pub const EC_REG_FAN_MODE: u8 = 93;
pub const EC_REG_FAN_TACHO: u8 = 149;

#[derive(Debug, Error)]
pub enum EcError {
    #[error("EC did not respond to a read of register {addr}")]
    Read {
        addr: u8,
        #[source]
        source: io::Error,
    },
    #[error("EC status still busy after {attempts} polls of port {port:#04x}")]
    WriteTimeout { port: u16, attempts: u16 },
    #[error("Failed to access I/O port {port:#04x}")]
    Port {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("Failed to open {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// Byte level transactions with the embedded controller.
// Holding `&mut EcClient` is the critical section, a fan
// command sequence can't interleave with another one.
pub struct EcClient {
    ports: Box<dyn PortIo>,
    registers: Box<dyn EcRegisters>,
}

impl EcClient {
    pub fn new(
        ports: impl PortIo + 'static,
        registers: impl EcRegisters + 'static,
    ) -> Self {
        Self {
            ports: Box::new(ports),
            registers: Box::new(registers),
        }
    }

    // Open the production backends
    pub fn open(port_device: &Path, ec_registers: &Path) -> Result<Self, EcError> {
        let ports = DevPort::open(port_device)?;
        let registers = DebugfsRegisters::open(ec_registers)?;

        Ok(Self::new(ports, registers))
    }

    pub fn read_register(&mut self, addr: u8) -> Result<u8, EcError> {
        let value = self
            .registers
            .read_register(addr)
            .map_err(|source| EcError::Read { addr, source })?;

        trace!("EC register {addr} = {value:#04x}");

        Ok(value)
    }

    // Poll `port` until `mask` clears or the attempts run out.
    // Returns whether the bits cleared. A failed status read
    // ends the wait early.
    pub fn wait_for_clear(&mut self, port: u16, mask: u8, max_attempts: u16) -> bool {
        for _ in 0..max_attempts {
            match self.ports.read_port(port) {
                Ok(status) if status & mask == 0 => return true,
                Ok(_) => {}
                Err(err) => {
                    trace!("Status read of port {port:#04x} failed: {err}");
                    return false;
                }
            }
        }

        false
    }

    pub fn write_command(&mut self, value: u8) -> Result<(), EcError> {
        self.wait_and_write(EC_COMMAND_PORT, value)
    }

    pub fn write_data(&mut self, value: u8) -> Result<(), EcError> {
        self.wait_and_write(EC_DATA_PORT, value)
    }

    // Fan command: 0x81 on the command port, then the
    // sub-command and its payload on the data port
    pub fn send_fan_command(&mut self, sub_command: u8, payload: u8) -> Result<(), EcError> {
        self.write_command(EC_CMD_FAN)?;
        self.write_data(sub_command)?;
        self.write_data(payload)?;

        Ok(())
    }

    fn wait_and_write(&mut self, port: u16, value: u8) -> Result<(), EcError> {
        // The hardware is expected to recover, write anyway
        if !self.wait_for_clear(EC_COMMAND_PORT, EC_STATUS_BUSY, EC_WAIT_ATTEMPTS) {
            warn!(
                "{}",
                EcError::WriteTimeout {
                    port: EC_COMMAND_PORT,
                    attempts: EC_WAIT_ATTEMPTS,
                }
            );
        }

        trace!("EC write {value:#04x} to port {port:#04x}");

        self.ports
            .write_port(port, value)
            .map_err(|source| EcError::Port { port, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeEc, PortEvent};

    #[test]
    fn fan_command_is_three_waited_writes() {
        let fake = FakeEc::new();
        let mut ec = fake.client();

        ec.send_fan_command(EC_SUBCMD_FAN_SPEED, 0x70).unwrap();

        assert_eq!(
            fake.events(),
            vec![
                PortEvent::Poll(EC_COMMAND_PORT),
                PortEvent::Write(EC_COMMAND_PORT, EC_CMD_FAN),
                PortEvent::Poll(EC_COMMAND_PORT),
                PortEvent::Write(EC_DATA_PORT, EC_SUBCMD_FAN_SPEED),
                PortEvent::Poll(EC_COMMAND_PORT),
                PortEvent::Write(EC_DATA_PORT, 0x70),
            ]
        );
    }

    #[test]
    fn wait_for_clear_polls_until_ready() {
        let fake = FakeEc::new();
        fake.set_busy_polls(3);
        let mut ec = fake.client();

        assert!(ec.wait_for_clear(EC_COMMAND_PORT, EC_STATUS_BUSY, 10));
        assert_eq!(fake.polls(), 4);
    }

    #[test]
    fn wait_for_clear_gives_up_after_budget() {
        let fake = FakeEc::new();
        fake.set_busy_polls(usize::MAX);
        let mut ec = fake.client();

        assert!(!ec.wait_for_clear(EC_COMMAND_PORT, EC_STATUS_BUSY, 16));
        assert_eq!(fake.polls(), 16);
    }

    #[test]
    fn write_proceeds_after_timeout() {
        let fake = FakeEc::new();
        fake.set_busy_polls(usize::MAX);
        let mut ec = fake.client();

        ec.write_data(0x42).unwrap();

        assert_eq!(fake.polls(), EC_WAIT_ATTEMPTS as usize);
        assert_eq!(fake.writes(), vec![(EC_DATA_PORT, 0x42)]);
    }

    #[test]
    fn other_status_bits_are_ignored() {
        let fake = FakeEc::new();
        fake.set_status(0xFD);
        let mut ec = fake.client();

        assert!(ec.wait_for_clear(EC_COMMAND_PORT, EC_STATUS_BUSY, 1));
    }

    #[test]
    fn read_failure_is_an_error_not_zero() {
        let fake = FakeEc::new();
        fake.set_register(EC_REG_TEMPERATURE, 0);
        fake.fail_reads(true);
        let mut ec = fake.client();

        let err = ec.read_register(EC_REG_TEMPERATURE).unwrap_err();

        assert!(matches!(err, EcError::Read { addr: EC_REG_TEMPERATURE, .. }));
    }

    #[test]
    fn read_register_returns_value() {
        let fake = FakeEc::new();
        fake.set_register(EC_REG_TEMPERATURE, 77);
        let mut ec = fake.client();

        assert_eq!(ec.read_register(EC_REG_TEMPERATURE).unwrap(), 77);
    }
}
