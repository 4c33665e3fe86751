// In-memory embedded controller recording every port access

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
};

use crate::ec::{
    EC_CMD_FAN, EC_COMMAND_PORT, EC_DATA_PORT, EC_STATUS_BUSY, EcClient,
    port_io::{EcRegisters, PortIo},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    Poll(u16),
    Write(u16, u8),
}

#[derive(Debug, Default)]
struct FakeState {
    events: Vec<PortEvent>,
    busy_polls: usize,
    status: u8,
    registers: HashMap<u8, u8>,
    fail_reads: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeEc {
    state: Arc<Mutex<FakeState>>,
}

impl FakeEc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> EcClient {
        EcClient::new(self.clone(), self.clone())
    }

    // Number of status polls reporting busy before the bit clears
    pub fn set_busy_polls(&self, polls: usize) {
        self.state.lock().unwrap().busy_polls = polls;
    }

    pub fn set_status(&self, status: u8) {
        self.state.lock().unwrap().status = status;
    }

    pub fn set_register(&self, addr: u8, value: u8) {
        self.state.lock().unwrap().registers.insert(addr, value);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn events(&self) -> Vec<PortEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().events.clear();
    }

    pub fn polls(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PortEvent::Poll(_)))
            .count()
    }

    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                PortEvent::Write(port, value) => Some((*port, *value)),
                PortEvent::Poll(_) => None,
            })
            .collect()
    }

    // Decode the writes into (sub-command, payload) fan commands
    pub fn fan_commands(&self) -> Vec<(u8, u8)> {
        let writes = self.writes();

        writes
            .chunks(3)
            .map(|chunk| {
                assert_eq!(chunk[0], (EC_COMMAND_PORT, EC_CMD_FAN));
                assert_eq!(chunk[1].0, EC_DATA_PORT);
                assert_eq!(chunk[2].0, EC_DATA_PORT);

                (chunk[1].1, chunk[2].1)
            })
            .collect()
    }
}

impl PortIo for FakeEc {
    fn read_port(&mut self, port: u16) -> io::Result<u8> {
        let mut state = self.state.lock().unwrap();
        state.events.push(PortEvent::Poll(port));

        if state.busy_polls > 0 {
            state.busy_polls -= 1;
            Ok(state.status | EC_STATUS_BUSY)
        } else {
            Ok(state.status)
        }
    }

    fn write_port(&mut self, port: u16, value: u8) -> io::Result<()> {
        self.state
            .lock()
            .unwrap()
            .events
            .push(PortEvent::Write(port, value));

        Ok(())
    }
}

impl EcRegisters for FakeEc {
    fn read_register(&mut self, addr: u8) -> io::Result<u8> {
        let state = self.state.lock().unwrap();

        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "EC timeout"));
        }

        Ok(state.registers.get(&addr).copied().unwrap_or(0))
    }
}
