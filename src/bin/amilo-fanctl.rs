use amilo_fand::dbus_service::FanProxy;
use anyhow::{Context, Result, bail};
use argparse::{ArgumentParser, Print, Store, StoreTrue};
use zbus::Connection;

struct ClientOptions {
    command: String,
    payload: String,
    session: bool,
}

impl ClientOptions {
    fn parse() -> Self {
        let mut options = ClientOptions {
            command: String::new(),
            payload: String::new(),
            session: false,
        };

        {
            let mut parser = ArgumentParser::new();
            parser.set_description("Query and control the amilo-fand daemon");

            parser.refer(&mut options.session).add_option(
                &["--session"],
                StoreTrue,
                "Talk to a daemon on the session bus",
            );

            parser.add_option(
                &["-V", "--version"],
                Print(env!("CARGO_PKG_VERSION").to_string()),
                "Show the client version",
            );

            parser
                .refer(&mut options.command)
                .add_argument("command", Store, "status, send, temperature or rpm")
                .required();

            parser.refer(&mut options.payload).add_argument(
                "payload",
                Store,
                "Command payload for send: X on, O off, A auto, S software",
            );

            parser.parse_args_or_exit();
        }

        options
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = ClientOptions::parse();

    let connection = if options.session {
        Connection::session().await
    } else {
        Connection::system().await
    };
    let connection = connection.with_context(|| "Failed to connect to the bus")?;

    let proxy = FanProxy::new(&connection)
        .await
        .with_context(|| "Failed to reach amilo-fand")?;

    match options.command.as_str() {
        "status" => {
            print!("{}", proxy.status().await?);
        }
        "send" => {
            if options.payload.is_empty() {
                bail!("send needs a payload");
            }

            let consumed = proxy.send_command(&options.payload).await?;
            println!("{consumed} bytes sent");
        }
        "temperature" => {
            println!("{} C", proxy.temperature().await?);
        }
        "rpm" => {
            println!("{} RPM", proxy.fan_rpm().await?);
        }
        other => bail!("Unknown command: {other}"),
    }

    Ok(())
}
