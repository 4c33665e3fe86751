use std::time::Duration;

use tokio::{
    select,
    sync::{
        mpsc::{Receiver, Sender},
        oneshot,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{
    control_mode::ControlMode,
    controller::SharedController,
    errors::FandError,
    scheduler::ThermalScheduler,
    status::status_message,
};

pub type Responder = oneshot::Sender<FanAnswer>;

// Requests from the command channel, the status channel
// and the sleep monitor
#[derive(Debug)]
pub enum FanMessage {
    // Raw payload, only the last command character counts
    Command { payload: Vec<u8>, tx: Responder },
    Status { tx: Responder },
    Temperature { tx: Responder },
    FanRpm { tx: Responder },

    // The system woke up from sleep
    Resume,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FanAnswer {
    Command(Option<ControlMode>),
    Status(String),
    Temperature(Option<u8>),
    FanRpm(Option<u32>),
}

// Owns the mode machine side of the daemon and the
// lifetime of the thermal scheduler
pub struct FanManager {
    controller: SharedController,
    scheduler: Option<ThermalScheduler>,

    // Period of the thermal scheduler disable zone
    base_interval: Duration,
    debug_status: bool,
}

impl FanManager {
    pub fn new(
        controller: SharedController,
        base_interval: Duration,
        debug_status: bool,
    ) -> Self {
        Self {
            controller,
            scheduler: None,

            base_interval,
            debug_status,
        }
    }

    // Run the fan manager
    pub async fn run(
        &mut self,
        initial_mode: ControlMode,
        run_token: CancellationToken,
        mut rx_cmd: Receiver<FanMessage>,
        tx_err: Sender<FandError>,
    ) {
        info!("Fan manager: Running");

        self.handle_command(&[initial_mode.command_char()]).await;

        let mut channel_open = true;

        loop {
            select! {
                _ = run_token.cancelled() => {
                    info!("Fan manager: Quiting");

                    if let Err(err) = self.cleanup().await {
                        tx_err.send(err).await.unwrap_or_else(|err| {
                            error!("Failed to send error over channel: {err}");
                        });
                    }

                    break;
                },
                message = rx_cmd.recv(), if channel_open => {
                    let Some(message) = message else {
                        warn!("Fan manager: command channel closed");
                        channel_open = false;
                        continue;
                    };

                    trace!("Parsing message: {:?}", message);

                    if let Err(err) = self.parse_msg(message).await {
                        tx_err.send(err).await.unwrap_or_else(|err| {
                            error!("Fan manager: Couldn't send error to channel: {err}")
                        });
                    }
                },
            }
        }
    }

    async fn parse_msg(&mut self, message: FanMessage) -> Result<(), FandError> {
        let (tx, answer) = match message {
            FanMessage::Command { payload, tx } => {
                let mode = self.handle_command(&payload).await;
                (tx, FanAnswer::Command(mode))
            }
            FanMessage::Status { tx } => {
                let report = self.controller.lock().await.read_status();

                if let Err(err) = &report {
                    warn!("Status report failed: {err}");
                }

                (tx, FanAnswer::Status(status_message(report, self.debug_status)))
            }
            FanMessage::Temperature { tx } => {
                let temp = self.controller.lock().await.read_temperature().ok();
                (tx, FanAnswer::Temperature(temp))
            }
            FanMessage::FanRpm { tx } => {
                let rpm = self.controller.lock().await.read_fan_rpm().ok();
                (tx, FanAnswer::FanRpm(rpm))
            }
            FanMessage::Resume => {
                self.handle_resume().await;
                return Ok(());
            }
        };

        tx.send(answer).map_err(|_| FandError::ChannelClosed)
    }

    // Apply the last command character of a payload, starting the
    // thermal scheduler on entry to software control. Leaving
    // software control keeps the scheduler running.
    pub async fn handle_command(&mut self, payload: &[u8]) -> Option<ControlMode> {
        let transition = self.controller.lock().await.process_payload(payload)?;

        if transition.start_scheduler {
            self.start_scheduler();
        }

        Some(transition.mode)
    }

    // Replay the command issued before sleep
    pub async fn handle_resume(&mut self) {
        info!("Woke up from sleep");

        let transition = self.controller.lock().await.replay_last_command();

        if transition.start_scheduler {
            self.start_scheduler();
        }
    }

    pub fn scheduler_running(&self) -> bool {
        self.scheduler
            .as_ref()
            .is_some_and(|scheduler| scheduler.is_running())
    }

    // Stop the thermal scheduler and give the fan back to the EC
    pub async fn cleanup(&mut self) -> Result<(), FandError> {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }

        trace!("Setting fan mode to Auto");
        self.controller.lock().await.set_auto()?;

        Ok(())
    }

    fn start_scheduler(&mut self) {
        if self.scheduler.is_some() {
            debug!("Thermal scheduler already armed");
            return;
        }

        self.scheduler = Some(ThermalScheduler::start(
            self.controller.clone(),
            self.base_interval,
        ));
    }
}
