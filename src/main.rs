use amilo_fand::{
    arg_parser::ArgsOptions, config_manager::DaemonConfig, controller::Controller,
    dbus_service::DBusService, ec::EcClient, errors::FandError, fan_manager::FanManager,
    logger, sleep_monitor::SleepMonitor,
};
use anyhow::{Context, Result};
use tokio::{
    select,
    signal::{
        ctrl_c,
        unix::{SignalKind, signal},
    },
    sync::mpsc,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logging();

    // Parse the command line arguments
    let args_options = ArgsOptions::parse();

    let config = DaemonConfig::load_or_default(&args_options.config_file_path);
    let initial_mode = config
        .initial_mode()
        .with_context(|| "Invalid initial fan command")?;

    let ec = EcClient::open(&config.port_device, &config.ec_registers)
        .with_context(|| "Failed to open the embedded controller")?;
    let controller = Controller::new(ec).shared();

    // This token and tracker will be used to handle graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    // Background tasks report their errors over this channel
    let (tx_err, mut rx_err) = mpsc::channel(16);

    // Start the fan manager
    let (tx_fan_manager, rx_fan_manager) = mpsc::channel(16);
    {
        let token = token.clone();
        let tx_err = tx_err.clone();
        let controller = controller.clone();
        let base_interval = config.base_interval();
        let debug_status = config.debug_status;

        tracker.spawn(async move {
            let mut fan_manager =
                FanManager::new(controller, base_interval, debug_status);

            fan_manager
                .run(initial_mode, token, rx_fan_manager, tx_err)
                .await;
        });
    }

    // Start the D-Bus service
    {
        let token = token.clone();
        let tx_err = tx_err.clone();
        let tx_fan_manager = tx_fan_manager.clone();
        let bus = config.bus;

        tracker.spawn(async move {
            let mut dbus_service = DBusService::new(bus);
            dbus_service.run(token, tx_fan_manager, tx_err).await;
        });
    }

    // Start the sleep monitor
    {
        let token = token.clone();
        let tx_err = tx_err.clone();

        tracker.spawn(async move {
            let mut sleep_monitor = SleepMonitor::new();
            sleep_monitor.run(token, tx_fan_manager, tx_err).await;
        });
    }

    let mut sigterm = signal(SignalKind::terminate())
        .with_context(|| "Failed to install the SIGTERM handler")?;

    loop {
        select! {
            _ = ctrl_c() => {
                info!("Received SIGINT");
                break;
            },
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                break;
            },
            err_msg = rx_err.recv() => {
                if let Some(err) = err_msg {
                    log_error(err);
                }
            }
        }
    }

    // Cancel the token to communicate the program
    // termination to the running tasks
    token.cancel();

    // Wait for the tasks to finish, the fan manager
    // hands the fan back to the EC on its way out
    tracker.close();
    tracker.wait().await;

    while let Ok(err) = rx_err.try_recv() {
        log_error(err);
    }

    Ok(())
}

fn log_error(err: FandError) {
    for e in anyhow::Error::from(err).chain() {
        error!("{e}");
    }
}
