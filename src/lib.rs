pub mod arg_parser;
pub mod config_manager;
pub mod control_mode;
pub mod controller;
pub mod dbus_service;
pub mod ec;
pub mod errors;
pub mod fan_actuator;
pub mod fan_curve;
pub mod fan_manager;
pub mod logger;
pub mod scheduler;
pub mod sleep_monitor;
pub mod status;

#[cfg(test)]
pub mod test_utils;
