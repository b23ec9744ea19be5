//! Run a message generator configuration.
//!
//! Usage:
//!   modgen [OPTIONS]
//!
//! Options:
//!   --conf, -c FILE       Configuration file (default: ./Conf/conf_test.xml)
//!   --trace, -t LEVEL     0=trace 1=debug 2=info 3=warn 4=error 5=off (default: 0)
//!   --ticks, -n N         Stop after N ticks (default: run forever)
//!   --utc-offset HOURS    Offset applied to time fields (default: 2)
//!   --dump                Print the model description and exit
//!   --help, -h            Show this help
//!
//! `RUST_LOG`, when set, overrides `--trace`.

use anyhow::{bail, Context};
use modgen::{format_bits, Model, SystemClock};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONF: &str = "./Conf/conf_test.xml";

fn usage() {
    eprintln!("Usage: modgen [-c FILE] [-t LEVEL] [-n TICKS] [--utc-offset HOURS] [--dump]");
    eprintln!("  -c, --conf FILE        configuration file (default: {})", DEFAULT_CONF);
    eprintln!("  -t, --trace LEVEL      0=trace 1=debug 2=info 3=warn 4=error 5=off");
    eprintln!("  -n, --ticks N          stop after N ticks");
    eprintln!("      --utc-offset HOURS offset applied to time fields (default: 2)");
    eprintln!("      --dump             print the model description and exit");
}

fn level_filter(level: u8) -> anyhow::Result<&'static str> {
    Ok(match level {
        0 => "trace",
        1 => "debug",
        2 => "info",
        3 => "warn",
        4 => "error",
        5 => "off",
        _ => bail!("trace level must be between 0 and 5, got {}", level),
    })
}

/// Remove `flag` (or its short alias) and the value following it.
fn take_value(args: &mut Vec<String>, long: &str, short: Option<&str>) -> anyhow::Result<Option<String>> {
    let Some(pos) = args
        .iter()
        .position(|a| a == long || short.is_some_and(|s| a == s))
    else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} requires a value", long);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

fn take_flag(args: &mut Vec<String>, long: &str, short: Option<&str>) -> bool {
    match args
        .iter()
        .position(|a| a == long || short.is_some_and(|s| a == s))
    {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if take_flag(&mut args, "--help", Some("-h")) {
        usage();
        return Ok(());
    }
    let conf = take_value(&mut args, "--conf", Some("-c"))?.unwrap_or_else(|| DEFAULT_CONF.to_string());
    let trace: u8 = match take_value(&mut args, "--trace", Some("-t"))? {
        Some(v) => v.parse().with_context(|| format!("invalid trace level '{}'", v))?,
        None => 0,
    };
    let ticks: Option<u64> = take_value(&mut args, "--ticks", Some("-n"))?
        .map(|v| v.parse().with_context(|| format!("invalid tick count '{}'", v)))
        .transpose()?;
    let utc_offset: i64 = match take_value(&mut args, "--utc-offset", None)? {
        Some(v) => v.parse().with_context(|| format!("invalid UTC offset '{}'", v))?,
        None => SystemClock::default().utc_offset_hours,
    };
    let dump = take_flag(&mut args, "--dump", None);
    if let Some(extra) = args.first() {
        usage();
        bail!("unexpected argument '{}'", extra);
    }

    let level = level_filter(trace)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    let mut model = Model::with_clock(Box::new(SystemClock::with_utc_offset(utc_offset)));
    model
        .setup(&conf)
        .with_context(|| format!("failed to load {}", conf))?;
    model.log();
    if dump {
        print!("{}", model.describe());
        return Ok(());
    }

    let mut count = 0u64;
    while ticks.map_or(true, |n| count < n) {
        let out = model.tick()?;
        info!(state = %out.state, messages = out.messages.len(), "state visited");
        for (bytes, route) in out.messages.iter().zip(&out.routes) {
            info!(
                "{}:{} -> {}:{} [{} bytes] {}",
                route.src_ip,
                route.src_port,
                route.dst_ip,
                route.dst_port,
                bytes.len(),
                format_bits(bytes)
            );
        }
        count += 1;
    }
    model.stop();
    info!(ticks = count, "{}", model.status().as_str());
    Ok(())
}
