use anyhow::anyhow;
use futures::StreamExt;
use tokio::{select, sync::mpsc::Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zbus::{Connection, proxy};

use crate::{dbus_service::DbusServiceError, errors::FandError, fan_manager::FanMessage};

#[proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LoginManager {
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

// Ask the fan manager to replay its last command each
// time logind reports the end of a sleep cycle
pub struct SleepMonitor;

impl SleepMonitor {
    pub fn new() -> Self {
        Self {}
    }

    pub async fn run(
        &mut self,
        run_token: CancellationToken,
        tx_fan_manager: Sender<FanMessage>,
        tx_err: Sender<FandError>,
    ) {
        info!("Sleep monitor: Running");

        if let Err(err) = self.monitor(&run_token, &tx_fan_manager).await {
            if let Err(cerr) = tx_err.send(err.into()).await {
                error!("Failed to send error over channel: {cerr}");
            }
        }

        info!("Sleep monitor: Quiting");
    }

    async fn monitor(
        &self,
        run_token: &CancellationToken,
        tx_fan_manager: &Sender<FanMessage>,
    ) -> Result<(), DbusServiceError> {
        // logind only lives on the system bus
        let connection = Connection::system().await.map_err(|e| {
            DbusServiceError::DBusConnection {
                reason: "Failed to connect to the system bus".to_string(),
                error: e.into(),
            }
        })?;

        let proxy = LoginManagerProxy::new(&connection).await.map_err(|e| {
            DbusServiceError::DBusObject {
                reason: "Failed to create the logind proxy".to_string(),
                error: e.into(),
            }
        })?;

        let mut signals = proxy.receive_prepare_for_sleep().await.map_err(|e| {
            DbusServiceError::Signal {
                reason: "Failed to subscribe to PrepareForSleep".to_string(),
                error: e.into(),
            }
        })?;

        loop {
            select! {
                _ = run_token.cancelled() => break,
                signal = signals.next() => {
                    let Some(signal) = signal else {
                        warn!("Sleep monitor: PrepareForSleep stream ended");
                        break;
                    };

                    let start = match signal.args() {
                        Ok(args) => *args.start(),
                        Err(err) => {
                            warn!("Malformed PrepareForSleep signal: {err}");
                            continue;
                        }
                    };

                    if start {
                        debug!("System going to sleep");
                        continue;
                    }

                    tx_fan_manager.send(FanMessage::Resume).await.map_err(|e| {
                        DbusServiceError::TX {
                            reason: "Failed to send resume to fan manager".to_string(),
                            error: anyhow!("{:?}", e),
                        }
                    })?;
                }
            }
        }

        Ok(())
    }
}

impl Default for SleepMonitor {
    fn default() -> Self {
        Self::new()
    }
}
