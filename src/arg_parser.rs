use std::path::PathBuf;

use argparse::{ArgumentParser, Print, Store};

use crate::config_manager::DEFAULT_CONFIG_PATH;

pub struct ArgsOptions {
    pub config_file_path: PathBuf,
}

impl ArgsOptions {
    pub fn parse() -> Self {
        let mut options = ArgsOptions::default();

        {
            let mut parser = ArgumentParser::new();
            parser.set_description("Fan control daemon for the FSC Amilo XA3530");

            // Configuration file path
            parser.refer(&mut options.config_file_path).add_option(
                &["-c", "--config"],
                Store,
                "The file path of the configuration file",
            );

            // Show daemon version
            parser.add_option(
                &["-V", "--version"],
                Print(env!("CARGO_PKG_VERSION").to_string()),
                "Show the daemon version",
            );

            parser.parse_args_or_exit();
        }

        options
    }
}

impl Default for ArgsOptions {
    fn default() -> Self {
        Self {
            config_file_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }
}
