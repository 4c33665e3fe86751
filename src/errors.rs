use thiserror::Error;

use crate::{dbus_service::DbusServiceError, ec::EcError};

// The main daemon error type, background tasks report
// it over the error channel
#[derive(Debug, Error)]
pub enum FandError {
    #[error(transparent)]
    Ec(#[from] EcError),
    #[error(transparent)]
    DBusService(#[from] DbusServiceError),
    #[error("Fan manager channel closed")]
    ChannelClosed,
}
