use anyhow::anyhow;
use thiserror::Error;
use tokio::sync::{mpsc::Sender, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};
use zbus::{Connection, fdo, interface, proxy};

use crate::{
    config_manager::BusKind,
    errors::FandError,
    fan_manager::{FanAnswer, FanMessage, Responder},
};

pub const SERVICE_NAME: &str = "org.amilo.Fand1";
pub const OBJECT_PATH: &str = "/org/amilo/Fand1";

type Result<T> = std::result::Result<T, DbusServiceError>;

#[derive(Debug, Error)]
pub enum DbusServiceError {
    #[error("DBus service manager TX error: {reason}")]
    TX {
        reason: String,
        error: anyhow::Error,
    },
    #[error("DBus service manager RX error: {reason}")]
    RX {
        reason: String,
        error: anyhow::Error,
    },
    #[error("DBus service invalid response error: {reason}")]
    InvalidResponse { reason: String },
    #[error("DBus service DBus connection error: {reason}")]
    DBusConnection {
        reason: String,
        error: anyhow::Error,
    },
    #[error("DBus service DBus object error: {reason}")]
    DBusObject {
        reason: String,
        error: anyhow::Error,
    },
    #[error("DBus service signal error: {reason}")]
    Signal {
        reason: String,
        error: anyhow::Error,
    },
    #[error("Error reading from embedded controller")]
    EcRead,
}

impl From<DbusServiceError> for fdo::Error {
    fn from(err: DbusServiceError) -> Self {
        fdo::Error::Failed(err.to_string())
    }
}

// Client side of the fan interface
#[proxy(
    interface = "org.amilo.Fand1.Fan",
    default_service = "org.amilo.Fand1",
    default_path = "/org/amilo/Fand1"
)]
pub trait Fan {
    fn send_command(&self, payload: &str) -> zbus::Result<u32>;

    fn status(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn temperature(&self) -> zbus::Result<u8>;

    #[zbus(property)]
    fn fan_rpm(&self) -> zbus::Result<u32>;
}

// Fan D-Bus interface, every request is forwarded to the fan manager
pub struct FanInterface {
    tx_fan_manager: Sender<FanMessage>,
}

impl FanInterface {
    pub fn new(tx_fan_manager: Sender<FanMessage>) -> Self {
        Self { tx_fan_manager }
    }

    async fn request(
        &self,
        message: impl FnOnce(Responder) -> FanMessage,
    ) -> Result<FanAnswer> {
        let (tx, rx) = oneshot::channel();

        self.tx_fan_manager.send(message(tx)).await.map_err(|e| {
            DbusServiceError::TX {
                reason: "Failed to send message to fan manager".to_string(),
                error: anyhow!("{:?}", e),
            }
        })?;

        rx.await.map_err(|e| DbusServiceError::RX {
            reason: "Error while waiting for fan manager answer".to_string(),
            error: e.into(),
        })
    }

    // Forward a command payload, the whole payload counts as consumed
    pub async fn command(&self, payload: &str) -> Result<u32> {
        let answer = self
            .request(|tx| FanMessage::Command {
                payload: payload.as_bytes().to_vec(),
                tx,
            })
            .await?;

        let FanAnswer::Command(mode) = answer else {
            return Err(invalid_response());
        };

        trace!("Command payload {:?} selected {:?}", payload, mode);

        Ok(payload.len() as u32)
    }

    pub async fn report(&self) -> Result<String> {
        match self.request(|tx| FanMessage::Status { tx }).await? {
            FanAnswer::Status(text) => Ok(text),
            _ => Err(invalid_response()),
        }
    }

    pub async fn read_temperature(&self) -> Result<u8> {
        match self.request(|tx| FanMessage::Temperature { tx }).await? {
            FanAnswer::Temperature(Some(temp)) => Ok(temp),
            FanAnswer::Temperature(None) => Err(DbusServiceError::EcRead),
            _ => Err(invalid_response()),
        }
    }

    pub async fn read_fan_rpm(&self) -> Result<u32> {
        match self.request(|tx| FanMessage::FanRpm { tx }).await? {
            FanAnswer::FanRpm(Some(rpm)) => Ok(rpm),
            FanAnswer::FanRpm(None) => Err(DbusServiceError::EcRead),
            _ => Err(invalid_response()),
        }
    }
}

#[interface(name = "org.amilo.Fand1.Fan")]
impl FanInterface {
    async fn send_command(&self, payload: &str) -> fdo::Result<u32> {
        Ok(self.command(payload).await?)
    }

    async fn status(&self) -> fdo::Result<String> {
        Ok(self.report().await?)
    }

    #[zbus(property)]
    async fn temperature(&self) -> fdo::Result<u8> {
        Ok(self.read_temperature().await?)
    }

    #[zbus(property)]
    async fn fan_rpm(&self) -> fdo::Result<u32> {
        Ok(self.read_fan_rpm().await?)
    }
}

fn invalid_response() -> DbusServiceError {
    DbusServiceError::InvalidResponse {
        reason: "Invalid response from fan manager".to_string(),
    }
}

pub struct DBusService {
    bus: BusKind,
}

impl DBusService {
    pub fn new(bus: BusKind) -> Self {
        Self { bus }
    }

    pub async fn run(
        &mut self,
        run_token: CancellationToken,
        tx_fan_manager: Sender<FanMessage>,
        tx_err: Sender<FandError>,
    ) {
        let connection = match self.connect().await {
            Ok(conn) => conn,
            Err(err) => {
                if let Err(cerr) = tx_err.send(err.into()).await {
                    error!("Failed to send error over channel: {cerr}")
                }

                // Just return, there is nothing else to do
                return;
            }
        };

        trace!("DBus connection enstablished");

        if let Err(err) =
            self.initialize_service(&connection, tx_fan_manager).await
        {
            if let Err(cerr) = tx_err.send(err.into()).await {
                error!("Failed to send error over channel: {}", cerr);
            }

            return;
        }

        info!("DBus service: Serving {SERVICE_NAME}");

        // The connection serves requests on its own executor
        // until it is dropped
        run_token.cancelled().await;

        info!("DBus service: Quiting");
    }

    async fn connect(&self) -> Result<Connection> {
        let connection = match self.bus {
            BusKind::System => Connection::system().await,
            BusKind::Session => Connection::session().await,
        };

        connection.map_err(|e| DbusServiceError::DBusConnection {
            reason: format!("Failed to establish connection with the {:?} bus", self.bus),
            error: e.into(),
        })
    }

    async fn initialize_service(
        &mut self,
        connection: &Connection,
        tx_fan_manager: Sender<FanMessage>,
    ) -> Result<()> {
        trace!("Creating D-Bus object at {}", OBJECT_PATH);

        connection
            .object_server()
            .at(OBJECT_PATH, FanInterface::new(tx_fan_manager))
            .await
            .map_err(|e| DbusServiceError::DBusObject {
                reason: "Error while initializing fan object".to_string(),
                error: e.into(),
            })?;

        // NOTE:    The name request must happen AFTER setting up the
        //          server object or messages might be lost
        connection.request_name(SERVICE_NAME).await.map_err(|e| {
            DbusServiceError::DBusConnection {
                reason: "Failed to acquire service name".to_string(),
                error: e.into(),
            }
        })?;

        Ok(())
    }
}
