mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Cli, Config};
use recorder::{RecorderSupervisor, discover_outputs};
use screen_capture_x11::ScreenCaptureX11;
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use video_encoder::{EncoderError, FfmpegEncoder, find_render_node, is_ffmpeg_installed};

const DRI_DIR: &str = "/dev/dri";

fn main() {
    init_logger();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{e:?}");
        std::process::exit(1);
    }
}

/// Line format `[HH:MM:SS LEVEL file line] message`, `info` unless `RUST_LOG` says otherwise.
fn init_logger() {
    use std::io::Write;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            let ts = cutil::time::local_now("%H:%M:%S");

            writeln!(
                buf,
                "[{} {style}{}{style:#} {} {}] {}",
                ts,
                record.level(),
                record
                    .file()
                    .unwrap_or("None")
                    .split('/')
                    .next_back()
                    .unwrap_or("None"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::from_cli(cli)?;
    let recorder_config = config.recorder_config();
    recorder_config.validate()?;

    let ffmpeg_path = &config.encoder.ffmpeg_path;
    if !is_ffmpeg_installed(ffmpeg_path) {
        return Err(EncoderError::FfmpegNotFound(ffmpeg_path.display().to_string()).into());
    }

    let vaapi_device = vaapi_device(&config)?;
    match &vaapi_device {
        Some(device) => log::info!("hardware encoding on {}", device.display()),
        None => log::info!("software encoding"),
    }
    let encoder = FfmpegEncoder::new(config.ffmpeg_config(vaapi_device));

    let mut capturer = ScreenCaptureX11::new(config.capture.display.clone());
    let outputs = discover_outputs(&mut capturer, &config.capture.only)?;

    let supervisor = RecorderSupervisor::new(Arc::new(AtomicBool::new(false)));
    let cancel_sig = supervisor.cancel_sig();
    ctrlc::set_handler(move || {
        log::info!("stop requested, finishing current captures");
        cancel_sig.store(true, Ordering::Relaxed);
    })
    .context("install signal handler failed")?;

    supervisor.record_outputs(outputs, &recorder_config, capturer, encoder)?;

    log::info!("all recorders stopped");
    Ok(())
}

fn vaapi_device(config: &Config) -> Result<Option<PathBuf>> {
    if !config.encoder.hwaccel {
        return Ok(None);
    }

    if let Some(device) = &config.encoder.vaapi_device {
        return Ok(Some(device.clone()));
    }

    let device = find_render_node(DRI_DIR)
        .context("hardware encoding needs a render node, pass --no-hwaccel to encode in software")?;
    Ok(Some(device))
}
