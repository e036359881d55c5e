use crate::{
    RecorderConfig, RecorderError,
    schedule::{CaptureWindow, sleep_until},
};
use chrono::{DateTime, Utc};
use screen_capture::{OutputRegion, Rectangle, ScreenCapture};
use std::{
    fs::DirBuilder,
    io::Write,
    os::unix::fs::DirBuilderExt,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use video_encoder::{EncoderError, FifoBridge, SegmentEncoder, SegmentJob};
use video_utils::subtitle::{SubtitleTimeline, save_as_srt};

pub const SUBTITLES_NAME: &str = "subtitles.srt";
const SCRATCH_PREFIX: &str = "workrecorder-";
const OUTPUT_DIR_MODE: u32 = 0o770;

/// Records one output into consecutive segments until cancelled.
pub struct OutputRecorder<C, E> {
    output: OutputRegion,
    config: RecorderConfig,
    capturer: C,
    encoder: E,
}

impl<C, E> OutputRecorder<C, E>
where
    C: ScreenCapture,
    E: SegmentEncoder + Sync,
{
    pub fn new(output: OutputRegion, config: RecorderConfig, capturer: C, encoder: E) -> Self {
        Self {
            output,
            config,
            capturer,
            encoder,
        }
    }

    pub fn output(&self) -> &OutputRegion {
        &self.output
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn run(&mut self, cancel_sig: &AtomicBool) -> Result<(), RecorderError> {
        self.config.validate()?;
        let interval = self.config.interval_delta()?;

        log::info!(
            "[{}] recording {} every {:?} into {}",
            self.output.name,
            self.output.region,
            self.config.interval,
            self.config.output_dir.display()
        );

        while !cancel_sig.load(Ordering::Relaxed) {
            let window = CaptureWindow::compute(
                Utc::now(),
                self.config.period_minutes,
                interval,
                self.config.fps,
            );

            if window.is_empty() {
                log::debug!(
                    "[{}] no capture left before {}, waiting for the next window",
                    self.output.name,
                    window.window_end.format("%H:%M:%S")
                );
            } else {
                match self.record_window(&window, cancel_sig) {
                    Ok(path) => log::info!("[{}] saved {}", self.output.name, path.display()),
                    Err(e) if e.is_cancellation() && cancel_sig.load(Ordering::Relaxed) => break,
                    Err(e) => {
                        log::warn!("[{}] recording window failed: {e}", self.output.name);
                        return Err(e);
                    }
                }
            }

            if !sleep_until(window.next_tick(), cancel_sig) {
                break;
            }
        }

        log::info!("[{}] recording stopped", self.output.name);
        Ok(())
    }

    /// Capture every tick of `window` and move the finished segment into the output tree.
    pub fn record_window(
        &mut self,
        window: &CaptureWindow,
        cancel_sig: &AtomicBool,
    ) -> Result<PathBuf, RecorderError> {
        let first_tick = window.first_tick().ok_or(EncoderError::NoFrames)?;

        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.config.scratch_dir)
            .map_err(|e| {
                RecorderError::Setup(format!(
                    "create scratch dir in {} failed: {e}",
                    self.config.scratch_dir.display()
                ))
            })?;

        let subtitles = scratch.path().join(SUBTITLES_NAME);
        self.write_subtitles(window, &subtitles)?;

        let scratch_output = self.config.scratch_output(scratch.path());
        let bridge = FifoBridge::new(scratch.path())?;

        log::debug!(
            "[{}] window {} with {} frames in {}",
            self.output.name,
            first_tick.format("%H:%M:%S"),
            window.frame_count(),
            scratch.path().display()
        );

        let name = self.output.name.as_str();
        let region = self.output.region;
        let capturer = &mut self.capturer;
        let encoder = &self.encoder;
        let fps = window.fps;

        bridge.run(
            cancel_sig,
            window.frame_count(),
            |w, index| {
                capture_frame(capturer, &region, window.ticks[index], cancel_sig, w)?;
                log::trace!("[{name}] frame {}/{}", index + 1, window.frame_count());
                Ok::<_, RecorderError>(())
            },
            |manifest, stop| {
                let job = SegmentJob {
                    manifest: manifest.to_path_buf(),
                    subtitles: subtitles.clone(),
                    output: scratch_output.clone(),
                    fps,
                };
                encoder.encode(&job, stop)
            },
        )?;

        let segment = self.config.segment_path(&self.output.name, first_tick);
        finalize(&scratch_output, &segment)?;
        Ok(segment)
    }

    fn write_subtitles(&self, window: &CaptureWindow, path: &Path) -> Result<(), RecorderError> {
        let mut timeline = SubtitleTimeline::new(window.fps);
        for tick in &window.ticks {
            timeline.push_frame(tick.format(&self.config.caption_format).to_string());
        }

        save_as_srt(&timeline.into_subtitles(), path)?;
        Ok(())
    }
}

fn capture_frame<C: ScreenCapture>(
    capturer: &mut C,
    region: &Rectangle,
    tick: DateTime<Utc>,
    cancel_sig: &AtomicBool,
    mut writer: &mut dyn Write,
) -> Result<(), RecorderError> {
    if !sleep_until(tick, cancel_sig) {
        return Err(RecorderError::Cancelled);
    }

    let reply = capturer.capture_region(region)?;
    let frame = screen_capture::decode(&reply, region.width, region.height)?;
    frame
        .encode_bmp(&mut writer)
        .map_err(|e| EncoderError::ImageEncode(e.to_string()))?;

    Ok(())
}

fn finalize(scratch_output: &Path, segment: &Path) -> Result<(), RecorderError> {
    if let Some(dir) = segment.parent() {
        DirBuilder::new()
            .recursive(true)
            .mode(OUTPUT_DIR_MODE)
            .create(dir)
            .map_err(|e| {
                RecorderError::Finalize(format!("create {} failed: {e}", dir.display()))
            })?;
    }

    cutil::fs::move_file(scratch_output, segment).map_err(|e| {
        RecorderError::Finalize(format!(
            "move {} to {} failed: {e}",
            scratch_output.display(),
            segment.display()
        ))
    })
}
