pub mod speed_calculator;

// Window of the fan speed offset commanded by software control.
// The encoding is inverted, the lower offset is the faster fan.
pub const MAX_SPEED_OFFSET: u8 = 102;
pub const MIN_SPEED_OFFSET: u8 = 127;

// Fixed speed offset for the critical zone
pub const CRITICAL_SPEED_OFFSET: u8 = 0x66;

// Speed offset written when the fan is stopped
pub const STOPPED_SPEED_OFFSET: u8 = 0xFF;

// Lowest speed written when entering a powered mode
pub const BASELINE_SPEED_OFFSET: u8 = 0x7E;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanSpeedOffset {
    offset: u8,
}

impl FanSpeedOffset {
    // Generate a new fan speed offset, automatically
    // clamped between MAX_SPEED_OFFSET and MIN_SPEED_OFFSET
    pub fn new(step: i32) -> FanSpeedOffset {
        FanSpeedOffset {
            offset: clamp_offset(step),
        }
    }

    // Return the stored offset
    pub fn get(&self) -> u8 {
        self.offset
    }
}

// Snap a fan step into the software window, anything faster
// than the fastest step becomes the fastest step and the same
// for the slowest one
pub fn clamp_offset(step: i32) -> u8 {
    step.clamp(MAX_SPEED_OFFSET as i32, MIN_SPEED_OFFSET as i32) as u8
}

// What a scheduler tick asks the fan to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanIntent {
    Disable,
    Critical,
    Speed(FanSpeedOffset),
}
