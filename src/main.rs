extern crate enigma2;

use std::process;

use anyhow::{anyhow, Context, Result};
use clap::{App, AppSettings, Arg, SubCommand};
use tracing_subscriber::EnvFilter;

use enigma2::{
    config::{DeviceConfig, HubConfig},
    devices::EnigmaDevice,
};

fn load(path: &str) -> Result<HubConfig> {
    HubConfig::from_file(path).with_context(|| format!("Could not load {}", path))
}

fn command_check(path: &str, json: bool) -> Result<()> {
    let config = load(path)?;
    if config.devices().is_empty() {
        eprintln!("No enigma devices configured");
    }

    for (index, device) in config.devices().iter().enumerate() {
        if json {
            check_print_json(device)?;
        } else {
            check_print_human(index, device);
        }
    }
    Ok(())
}

fn check_print_human(index: usize, device: &DeviceConfig) {
    let auth = if device.password.is_empty() {
        "plain"
    } else {
        "basic-auth"
    };
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        index,
        pad(&device.authority(), 24),
        pad(&device.name, 20),
        pad(auth, 10),
        pad(&format!("{}s", device.timeout.as_secs_f64()), 6),
        device.bouquet,
    );
}

fn check_print_json(device: &DeviceConfig) -> Result<()> {
    let mut device = device.clone();
    if !device.password.is_empty() {
        device.password = String::from("***");
    }
    println!("{}", serde_json::to_string(&device)?);
    Ok(())
}

fn pad(value: &str, padding: usize) -> String {
    let pad = " ".repeat(padding.saturating_sub(value.len()));
    format!("{}{}", value, pad)
}

fn command_request(path: &str, index: &str, request_path: &str) -> Result<()> {
    let config = load(path)?;
    let index: usize = index
        .parse()
        .with_context(|| format!("Invalid device index {}", index))?;
    let device_config = config
        .devices()
        .get(index)
        .cloned()
        .ok_or_else(|| anyhow!("No device at index {}", index))?;

    let device = EnigmaDevice::new(device_config);
    println!("{}", device.opener().get(request_path)?);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config_arg = Arg::with_name("config")
        .required(true)
        .help("Configuration file, YAML or JSON.");

    let matches = App::new("Enigma2 box CLI")
        .version("0.1")
        .about("Validate enigma configurations and talk to the configured boxes.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("json")
            .long("json")
            .takes_value(false)
            .help("Respond with JSON.")
        )
        .subcommand(SubCommand::with_name("check")
            .about("Validate a configuration and list its devices")
            .arg(config_arg.clone())
        )
        .subcommand(SubCommand::with_name("request")
            .about("Send a GET request to a configured device and print the body")
            .arg(config_arg)
            .arg(Arg::with_name("index")
                .required(true)
                .help("Position of the device in the configuration")
            )
            .arg(Arg::with_name("path")
                .required(true)
                .help("Path to request, e.g. /web/about")
            )
        )
        .get_matches();

    let result = match matches.subcommand() {
        ("check", Some(args)) => command_check(
            args.value_of("config").unwrap_or_default(),
            matches.is_present("json"),
        ),
        ("request", Some(args)) => command_request(
            args.value_of("config").unwrap_or_default(),
            args.value_of("index").unwrap_or_default(),
            args.value_of("path").unwrap_or_default(),
        ),
        _ => Ok(()),
    };

    if let Err(err) = result {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}
