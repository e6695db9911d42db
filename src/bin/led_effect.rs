use clap::{Args, Parser, Subcommand};
use ledstrip::base::color::Color;
use ledstrip::config::{Config, DEFAULT_CONFIG_FILE};
use ledstrip::controller::Controller;
use ledstrip::drivers::driver::OpenError;
use ledstrip::effect::{
    BreathingParams, CycleParams, EffectSpec, FadeParams, FlickerParams, ProfileParams,
    RandomParams,
};
use ledstrip_tools as ledstrip;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Run an LED strip effect until it finishes or Ctrl+C")]
struct CmdArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Override the configured PWM driver
    #[arg(short = 'd', long)]
    driver: Option<String>,
    #[command(subcommand)]
    effect: EffectCmd,
}

#[derive(Subcommand, Debug)]
enum EffectCmd {
    /// Fade to the active time-of-day profile color
    Profile {
        /// Fade duration in milliseconds
        #[arg(long, default_value_t = 10000)]
        duration: u64,
    },
    /// Breathing effect
    Breathing {
        /// Color for the breathing effect (name or hex)
        #[arg(long, default_value = "red")]
        color: String,
        /// Breathing cycle duration in milliseconds
        #[arg(long, default_value_t = 2000)]
        duration: u64,
        /// Stop after this many cycles instead of repeating
        #[arg(long)]
        cycles: Option<u32>,
    },
    /// Random color changes
    Random {
        /// Interval between color changes in milliseconds
        #[arg(long, default_value_t = 2000)]
        interval: u64,
        /// Fixed PRNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Warm, natural flicker (campfire)
    Campfire(FlickerArgs),
    /// Gentle candle flame flicker
    Candle(FlickerArgs),
    /// Cycle through colors
    Cycle {
        /// Comma-separated list of colors
        #[arg(long, default_value = "red,green,blue")]
        colors: String,
        /// Dwell time per color in milliseconds
        #[arg(long, default_value_t = 2000)]
        duration: u64,
    },
    /// Fade between two colors
    Fade {
        /// Starting color
        #[arg(long = "from", default_value = "black")]
        from_color: String,
        /// Ending color
        #[arg(long = "to", default_value = "white")]
        to_color: String,
        /// Fade duration in milliseconds
        #[arg(long, default_value_t = 5000)]
        duration: u64,
    },
}

/// Flicker tuning flags. Left-out values fall back to the effect's preset.
#[derive(Args, Debug)]
struct FlickerArgs {
    /// Base warm color (name or hex)
    #[arg(long, default_value = "#ff9329")]
    base_color: String,
    /// Total duration in milliseconds (0 = run until interrupted)
    #[arg(long)]
    duration: Option<u64>,
    /// Update rate in Hz
    #[arg(long)]
    update_hz: Option<u32>,
    /// Minimum perceived brightness 0..1
    #[arg(long)]
    min_brightness: Option<f32>,
    /// Maximum perceived brightness 0..1
    #[arg(long)]
    max_brightness: Option<f32>,
    /// Hue variation around the base color
    #[arg(long)]
    hue_jitter: Option<f32>,
    /// Override saturation 0..1
    #[arg(long)]
    saturation: Option<f32>,
    /// Chance per tick of a brief spark 0..1
    #[arg(long)]
    spark_chance: Option<f32>,
    /// Spark intensity multiplier
    #[arg(long)]
    spark_gain: Option<f32>,
    /// Smoothing time constant in ms
    #[arg(long)]
    tau_ms: Option<u32>,
    /// Perceptual gamma (e.g. 2.2)
    #[arg(long)]
    gamma: Option<f32>,
    /// Fixed PRNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

impl FlickerArgs {
    fn apply(self, mut params: FlickerParams) -> Result<FlickerParams, String> {
        params.base_color = self
            .base_color
            .parse::<Color>()
            .map_err(|e| e.to_string())?;
        if let Some(v) = self.duration {
            params.duration_ms = v;
        }
        if let Some(v) = self.update_hz {
            params.update_hz = v;
        }
        if let Some(v) = self.min_brightness {
            params.min_brightness = v;
        }
        if let Some(v) = self.max_brightness {
            params.max_brightness = v;
        }
        if let Some(v) = self.hue_jitter {
            params.hue_jitter = v;
        }
        if self.saturation.is_some() {
            params.saturation = self.saturation;
        }
        if let Some(v) = self.spark_chance {
            params.spark_chance = v;
        }
        if let Some(v) = self.spark_gain {
            params.spark_gain = v;
        }
        if let Some(v) = self.tau_ms {
            params.tau_ms = v;
        }
        if let Some(v) = self.gamma {
            params.gamma = v;
        }
        if self.seed.is_some() {
            params.seed = self.seed;
        }
        Ok(params)
    }
}

/// Completes on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
            return;
        }
    }
    let _ = tokio::signal::ctrl_c().await;
}

fn parse_colors(list: &str) -> Result<Vec<Color>, String> {
    list.split(',')
        .map(|s| s.trim().parse::<Color>().map_err(|e| e.to_string()))
        .collect()
}

fn build_spec(cmd: EffectCmd) -> Result<EffectSpec, String> {
    Ok(match cmd {
        EffectCmd::Profile { duration } => EffectSpec::Profile(ProfileParams {
            duration_ms: duration,
        }),
        EffectCmd::Breathing {
            color,
            duration,
            cycles,
        } => EffectSpec::Breathing(BreathingParams {
            color: color.parse::<Color>().map_err(|e| e.to_string())?,
            duration_ms: duration,
            cycles,
        }),
        EffectCmd::Random { interval, seed } => EffectSpec::Random(RandomParams {
            interval_ms: interval,
            seed,
        }),
        EffectCmd::Campfire(args) => EffectSpec::Campfire(args.apply(FlickerParams::campfire())?),
        EffectCmd::Candle(args) => EffectSpec::Candle(args.apply(FlickerParams::candle())?),
        EffectCmd::Cycle { colors, duration } => EffectSpec::Cycle(CycleParams {
            colors: parse_colors(&colors)?,
            duration_ms: duration,
        }),
        EffectCmd::Fade {
            from_color,
            to_color,
            duration,
        } => EffectSpec::Fade(FadeParams {
            from: from_color.parse::<Color>().map_err(|e| e.to_string())?,
            to: to_color.parse::<Color>().map_err(|e| e.to_string())?,
            duration_ms: duration,
        }),
    })
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

    let spec = match build_spec(args.effect) {
        Ok(spec) => spec,
        Err(msg) => {
            error!("{}", msg);
            return ExitCode::from(2);
        }
    };
    let name = spec.name();
    if let Err(e) = controller.start_effect(spec).await {
        error!("Failed to start effect: {}", e);
        return ExitCode::FAILURE;
    }
    info!("Effect '{}' running. Press Ctrl+C to stop.", name);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                if let Err(e) = controller.stop_effect().await {
                    error!("Failed to stop effect: {}", e);
                }
                if let Err(e) = controller.switch_off().await {
                    error!("Failed to switch off: {}", e);
                }
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                let status = controller.status();
                if status.effect.is_none() {
                    if let Some(err) = status.error {
                        error!("Effect failed: {}", err);
                        return ExitCode::FAILURE;
                    }
                    // Finished effects leave their final color on the strip.
                    info!("Effect finished");
                    break;
                }
            }
        }
    }
    ExitCode::SUCCESS
}
