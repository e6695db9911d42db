use clap::Parser;
use hyper::http::StatusCode;
use hyper::{header, Body, Method, Request, Response};
use ledstrip::base::brightness::Brightness;
use ledstrip::base::color::Color;
use ledstrip::config::{Config, DEFAULT_CONFIG_FILE};
use ledstrip::controller::{CommandError, Controller};
use ledstrip::drivers::driver::OpenError;
use ledstrip::effect::{
    BreathingParams, CycleParams, EffectSpec, FadeParams, FlickerParams, ProfileParams,
    RandomParams,
};
use ledstrip::error::{DynFuture, DynResult};
use ledstrip::httpd::{self, ServerConfig};
use ledstrip_tools as ledstrip;
use log::{error, info};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(about = "HTTP service for the LED strip controller")]
struct CmdArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Override the configured PWM driver
    #[arg(short = 'd', long)]
    driver: Option<String>,
    /// Bind HTTP-server to this address
    #[arg(long)]
    http_address: Option<IpAddr>,
    /// HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

fn text_response(status: StatusCode, text: String) -> DynResult<Response<Body>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(text))
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
}

fn bad_request(msg: &str) -> DynResult<Response<Body>> {
    text_response(StatusCode::BAD_REQUEST, msg.to_owned())
}

fn command_response(res: Result<(), CommandError>) -> DynResult<Response<Body>> {
    match res {
        Ok(()) => text_response(StatusCode::OK, String::new()),
        Err(e @ CommandError::Validation(_)) => {
            text_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ CommandError::Busy) => {
            text_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn json_response(json: String) -> DynResult<Response<Body>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json))
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
}

fn parse_query(query: Option<&str>) -> Result<BTreeMap<String, String>, String> {
    let mut args = BTreeMap::new();
    if let Some(query) = query {
        for kv in query.split('&').filter(|kv| !kv.is_empty()) {
            let Some((k, v)) = kv.split_once('=') else {
                return Err(format!("Missing '=' in query parameter '{}'", kv));
            };
            args.insert(k.to_string(), v.to_string());
        }
    }
    Ok(args)
}

fn get_arg<T: FromStr>(args: &BTreeMap<String, String>, name: &str) -> Result<Option<T>, String> {
    match args.get(name) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("Invalid value '{}' for '{}'", value, name)),
    }
}

fn parse_color_list(list: &str) -> Result<Vec<Color>, String> {
    list.split(',')
        .map(|s| s.trim().parse::<Color>().map_err(|e| e.to_string()))
        .collect()
}

fn flicker_from_args(
    mut params: FlickerParams,
    args: &BTreeMap<String, String>,
) -> Result<FlickerParams, String> {
    if let Some(v) = get_arg(args, "base_color")? {
        params.base_color = v;
    }
    if let Some(v) = get_arg(args, "duration")? {
        params.duration_ms = v;
    }
    if let Some(v) = get_arg(args, "update_hz")? {
        params.update_hz = v;
    }
    if let Some(v) = get_arg(args, "min_brightness")? {
        params.min_brightness = v;
    }
    if let Some(v) = get_arg(args, "max_brightness")? {
        params.max_brightness = v;
    }
    if let Some(v) = get_arg(args, "hue_jitter")? {
        params.hue_jitter = v;
    }
    if let Some(v) = get_arg(args, "saturation")? {
        params.saturation = Some(v);
    }
    if let Some(v) = get_arg(args, "spark_chance")? {
        params.spark_chance = v;
    }
    if let Some(v) = get_arg(args, "spark_gain")? {
        params.spark_gain = v;
    }
    if let Some(v) = get_arg(args, "tau_ms")? {
        params.tau_ms = v;
    }
    if let Some(v) = get_arg(args, "gamma")? {
        params.gamma = v;
    }
    if let Some(v) = get_arg(args, "seed")? {
        params.seed = Some(v);
    }
    Ok(params)
}

fn effect_from_args(name: &str, args: &BTreeMap<String, String>) -> Result<EffectSpec, String> {
    match name {
        "breathing" => {
            let mut params = BreathingParams::default();
            if let Some(v) = get_arg(args, "color")? {
                params.color = v;
            }
            if let Some(v) = get_arg(args, "duration")? {
                params.duration_ms = v;
            }
            if let Some(v) = get_arg(args, "cycles")? {
                params.cycles = Some(v);
            }
            Ok(EffectSpec::Breathing(params))
        }
        "fade" => {
            let mut params = FadeParams::default();
            if let Some(v) = get_arg(args, "from")? {
                params.from = v;
            }
            if let Some(v) = get_arg(args, "to")? {
                params.to = v;
            }
            if let Some(v) = get_arg(args, "duration")? {
                params.duration_ms = v;
            }
            Ok(EffectSpec::Fade(params))
        }
        "cycle" => {
            let mut params = CycleParams::default();
            if let Some(list) = args.get("colors") {
                params.colors = parse_color_list(list)?;
            }
            if let Some(v) = get_arg(args, "duration")? {
                params.duration_ms = v;
            }
            Ok(EffectSpec::Cycle(params))
        }
        "random" => {
            let mut params = RandomParams::default();
            if let Some(v) = get_arg(args, "interval")? {
                params.interval_ms = v;
            }
            if let Some(v) = get_arg(args, "seed")? {
                params.seed = Some(v);
            }
            Ok(EffectSpec::Random(params))
        }
        "profile" => {
            let mut params = ProfileParams::default();
            if let Some(v) = get_arg(args, "duration")? {
                params.duration_ms = v;
            }
            Ok(EffectSpec::Profile(params))
        }
        "campfire" => Ok(EffectSpec::Campfire(flicker_from_args(
            FlickerParams::campfire(),
            args,
        )?)),
        "candle" => Ok(EffectSpec::Candle(flicker_from_args(
            FlickerParams::candle(),
            args,
        )?)),
        _ => Err(format!("Unknown effect '{}'", name)),
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

async fn handle_request(
    controller: Arc<Controller>,
    req: Request<Body>,
) -> DynResult<Response<Body>> {
    let path = req.uri().path().to_owned();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let args = match parse_query(req.uri().query()) {
        Ok(args) => args,
        Err(msg) => return bad_request(&msg),
    };
    match (req.method(), segments.as_slice()) {
        (&Method::POST, ["on"]) => command_response(controller.switch_on().await),
        (&Method::POST, ["off"]) => command_response(controller.switch_off().await),
        (&Method::GET, ["status"]) => match serde_json::to_string(&controller.status()) {
            Ok(json) => json_response(json),
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        (&Method::GET, ["color"]) => {
            text_response(StatusCode::OK, controller.status().color.to_string())
        }
        (&Method::POST, ["color", value]) => match value.parse::<Color>() {
            Ok(color) => command_response(controller.set_color(color).await),
            Err(e) => bad_request(&e.to_string()),
        },
        (&Method::GET, ["brightness"]) => {
            text_response(StatusCode::OK, controller.status().brightness.to_string())
        }
        (&Method::POST, ["brightness", value]) => {
            let brightness = value
                .parse::<i64>()
                .map_err(|_| format!("Invalid brightness '{}'", value))
                .and_then(|v| Brightness::try_from(v).map_err(|e| e.to_string()));
            match brightness {
                Ok(brightness) => command_response(controller.set_brightness(brightness).await),
                Err(msg) => bad_request(&msg),
            }
        }
        (&Method::POST, ["effect", "stop"]) => command_response(controller.stop_effect().await),
        (&Method::POST, ["effect", name]) => match effect_from_args(name, &args) {
            Ok(spec) => command_response(controller.start_effect(spec).await),
            Err(msg) => bad_request(&msg),
        },
        // The scheduled automation hook: cron POSTs here to ease the strip
        // into the time-of-day color.
        (&Method::POST, ["profile"]) => match effect_from_args("profile", &args) {
            Ok(spec) => command_response(controller.start_effect(spec).await),
            Err(msg) => bad_request(&msg),
        },
        _ => text_response(StatusCode::NOT_FOUND, "No such command".to_string()),
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
    let controller = Arc::new(Controller::new(driver, config.profiles));

    let mut conf = ServerConfig::new();
    if let Some(addr) = args.http_address.or(config.http.bind) {
        conf = conf.bind_addr(addr);
    }
    conf = conf.port(args.http_port.unwrap_or(config.http.port));
    let handler = controller.clone();
    conf = conf.build_page(Box::new(
        move |req| -> DynFuture<'static, DynResult<Response<Body>>> {
            let controller = handler.clone();
            Box::pin(async move { handle_request(controller, req).await })
        },
    ));

    let (server, addr, port) = match httpd::start(conf) {
        Ok(started) => started,
        Err(e) => {
            error!("Failed to start HTTP server: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Started server at http://{}:{}", addr, port);

    tokio::select! {
        res = server => {
            if let Err(e) = res {
                error!("server error: {e}");
                return ExitCode::FAILURE;
            }
        }
        _ = shutdown_signal() => {
            info!("Shutting down");
        }
    }
    if let Err(e) = controller.switch_off().await {
        error!("Failed to switch off: {}", e);
    }
    ExitCode::SUCCESS
}
