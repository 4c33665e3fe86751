use std::time::Duration;

use tokio::select;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info};

use crate::{
    controller::SharedController,
    fan_curve::speed_calculator::{Zone, ZoneState, compute_offset},
};

// Handle on the running thermal task
pub struct ThermalScheduler {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl ThermalScheduler {
    // Create the task and arm its first tick after `base_interval`
    pub fn start(controller: SharedController, base_interval: Duration) -> Self {
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        {
            let token = token.clone();

            tracker.spawn(async move {
                let task = ThermalTask::new(controller, base_interval);
                task.run(token).await;
            });
        }

        // The task is never replaced, no more spawns on this tracker
        tracker.close();

        Self { token, tracker }
    }

    pub fn is_running(&self) -> bool {
        !self.tracker.is_empty()
    }

    // Cancel, flush, destroy. No tick is armed once this is
    // called, a tick already running completes its writes.
    pub async fn shutdown(self) {
        info!("Thermal scheduler: Stopping");

        self.token.cancel();
        self.tracker.wait().await;

        info!("Thermal scheduler: Stopped");
    }
}

// The periodic control loop, re-armed after every tick with
// the delay chosen by that tick
pub struct ThermalTask {
    controller: SharedController,
    base_interval: Duration,

    zone_state: ZoneState,
    last_zone: Option<Zone>,
    next_delay: Duration,
}

impl ThermalTask {
    pub fn new(controller: SharedController, base_interval: Duration) -> Self {
        Self {
            controller,
            base_interval,

            zone_state: ZoneState::default(),
            last_zone: None,
            next_delay: base_interval,
        }
    }

    pub async fn run(mut self, run_token: CancellationToken) {
        info!("Thermal scheduler: Running");

        loop {
            select! {
                biased;

                _ = run_token.cancelled() => {
                    info!("Thermal scheduler: Quiting");
                    break;
                },
                _ = tokio::time::sleep(self.next_delay) => {
                    // Not raced against the token, a started tick
                    // always finishes
                    self.next_delay = self.tick().await;
                }
            }
        }
    }

    // Sample, compute and apply. Returns the delay before the next tick.
    pub async fn tick(&mut self) -> Duration {
        let mut controller = self.controller.lock().await;

        let temp = match controller.read_temperature() {
            Ok(temp) => temp,
            Err(err) => {
                // Keep the zone state, try again next period
                error!("Thermal tick skipped: {err}");
                return self.base_interval * 2;
            }
        };

        let decision = compute_offset(temp, &self.zone_state, self.base_interval);
        let delta = temp as i32 - self.zone_state.previous_temp as i32;

        debug!(
            temp_c = temp,
            delta_c = delta,
            zone = ?decision.zone,
            intent = ?decision.intent,
            sloop = decision.next_state.hysteresis_counter,
            next_delay = ?decision.next_delay,
            "Thermal tick"
        );

        if self.last_zone != Some(decision.zone) {
            info!("Temp {temp}°C: fan zone {:?}", decision.zone);
            self.last_zone = Some(decision.zone);
        }

        if let Err(err) = controller.apply_intent(decision.intent) {
            error!("Failed to apply {:?}: {err}", decision.intent);
        }

        self.zone_state = decision.next_state;

        decision.next_delay
    }
}
