use std::time::Duration;

use crate::fan_curve::{FanIntent, FanSpeedOffset, MIN_SPEED_OFFSET};

// Below this temperature the fan may be switched off
pub const UP_THRESHOLD_TEMP: u8 = 85;
// Optimum idle temperature, start of the ramp
pub const SAFE_TEMP: u8 = 70;
// Above this temperature the fan runs at the critical step
pub const CRITICAL_TEMP: u8 = 95;

// Logical speed scale of the ramp
pub const MAX_SPEED: i32 = 100;
pub const MIN_SPEED: i32 = 0;
pub const SPEED_STEPS: i32 = 25;

// Ticks the fan stays on before it may be disabled again
pub const HYSTERESIS_TICKS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Disable,
    Critical,
    Proportional,
}

// Hysteresis state carried from one tick to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneState {
    pub previous_temp: u8,
    // Tick countdown, may go negative
    pub hysteresis_counter: i32,
    // Set while the fan is held off in the low temperature zone
    pub speed_switch: bool,
}

impl Default for ZoneState {
    fn default() -> Self {
        Self {
            previous_temp: 0,
            hysteresis_counter: HYSTERESIS_TICKS,
            speed_switch: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneDecision {
    pub zone: Zone,
    pub intent: FanIntent,
    pub next_state: ZoneState,
    pub next_delay: Duration,
}

// Map the current temperature and the previous tick state to the
// fan intent, the state for the next tick and the delay before it
pub fn compute_offset(
    current_temp: u8,
    state: &ZoneState,
    base_interval: Duration,
) -> ZoneDecision {
    let counter = state.hysteresis_counter - 1;

    let low = current_temp < UP_THRESHOLD_TEMP;
    let may_disable =
        counter < 0 || counter == HYSTERESIS_TICKS || state.speed_switch;

    let (zone, intent, next_state, next_delay) = if low && may_disable {
        (
            Zone::Disable,
            FanIntent::Disable,
            ZoneState {
                previous_temp: current_temp,
                hysteresis_counter: HYSTERESIS_TICKS,
                speed_switch: true,
            },
            base_interval,
        )
    } else if current_temp > CRITICAL_TEMP {
        (
            Zone::Critical,
            FanIntent::Critical,
            ZoneState {
                previous_temp: current_temp,
                hysteresis_counter: counter,
                speed_switch: false,
            },
            base_interval * 2,
        )
    } else {
        (
            Zone::Proportional,
            FanIntent::Speed(proportional_offset(current_temp)),
            ZoneState {
                previous_temp: current_temp,
                hysteresis_counter: counter,
                speed_switch: false,
            },
            base_interval * 2,
        )
    };

    ZoneDecision {
        zone,
        intent,
        next_state,
        next_delay,
    }
}

// Linear ramp from the slowest step at SAFE_TEMP to the
// fastest step at CRITICAL_TEMP, below SAFE_TEMP the slowest step
pub fn proportional_offset(temp: u8) -> FanSpeedOffset {
    if temp < SAFE_TEMP {
        return FanSpeedOffset::new(MIN_SPEED_OFFSET as i32);
    }

    let jump = (MAX_SPEED - MIN_SPEED) / (CRITICAL_TEMP - SAFE_TEMP) as i32;

    let speed_step = MIN_SPEED
        + jump * (temp as i32 - SAFE_TEMP as i32) * SPEED_STEPS / MAX_SPEED;

    FanSpeedOffset::new(MIN_SPEED_OFFSET as i32 - speed_step)
}
