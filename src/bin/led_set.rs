use clap::{Parser, Subcommand};
use ledstrip::base::brightness::Brightness;
use ledstrip::base::color::Color;
use ledstrip::config::{Config, DEFAULT_CONFIG_FILE};
use ledstrip::controller::{CommandError, Controller};
use ledstrip::drivers::driver::OpenError;
use ledstrip_tools as ledstrip;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(about = "Set the LED strip's static state")]
struct CmdArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Override the configured PWM driver
    #[arg(short = 'd', long)]
    driver: Option<String>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Stop any effect and switch to static white
    On,
    /// Stop any effect and turn the strip off
    Off,
    /// Stop any effect and set a static color (name or hex)
    Color { color: String },
    /// Set the output brightness in percent, keeping the color
    Brightness { percent: i64 },
    /// Print the controller state as JSON
    Status,
}

fn exit_code(e: &CommandError) -> ExitCode {
    match e {
        CommandError::Validation(_) => ExitCode::from(2),
        CommandError::Busy => ExitCode::from(3),
        CommandError::Hardware(_) => ExitCode::from(4),
        CommandError::Fault(_) => ExitCode::from(5),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    if let Err(e) = ledstrip::drivers::init() {
        error!("Failed to initialize PWM drivers: {}", e);
    }
    let args = CmdArgs::parse();
    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let driver_name = args.driver.as_deref().unwrap_or(&config.driver);
    let driver = match ledstrip::drivers::open(driver_name, &config.driver_params()) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to open PWM driver: {}", e);
            if let OpenError::NotFound = e {
                info!("Available drivers:");
                for name in ledstrip::drivers::driver_names() {
                    info!("  {}", name);
                }
            }
            return ExitCode::FAILURE;
        }
    };
    let controller = Controller::new(driver, config.profiles);

    let res = match args.cmd {
        Cmd::On => controller.switch_on().await,
        Cmd::Off => controller.switch_off().await,
        Cmd::Color { color } => match color.parse::<Color>() {
            Ok(color) => controller.set_color(color).await,
            Err(e) => Err(CommandError::Validation(e.to_string())),
        },
        Cmd::Brightness { percent } => match Brightness::try_from(percent) {
            Ok(brightness) => controller.set_brightness(brightness).await,
            Err(e) => Err(CommandError::Validation(e.to_string())),
        },
        Cmd::Status => match serde_json::to_string_pretty(&controller.status()) {
            Ok(json) => {
                println!("{}", json);
                Ok(())
            }
            Err(e) => Err(CommandError::Fault(e.to_string())),
        },
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            exit_code(&e)
        }
    }
}
