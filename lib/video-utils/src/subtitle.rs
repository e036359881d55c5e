use crate::Result;
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subtitle {
    pub index: u32,
    pub start_timestamp: u64,
    pub end_timestamp: u64,
    pub text: String,
}

/// Consecutive frames `[start_frame, end_frame)` that share one caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRun {
    pub start_frame: u64,
    pub end_frame: u64,
    pub text: String,
}

/// Folds a per-frame caption stream into the fewest caption runs.
///
/// Feed one caption per encoded frame, in frame order, then call
/// [`SubtitleTimeline::finish`]. Runs are contiguous and cover every pushed
/// frame exactly once.
#[derive(Debug, Clone)]
pub struct SubtitleTimeline {
    fps: u32,
    current_caption: Option<String>,
    run_start_frame: u64,
    current_frame: u64,
    runs: Vec<CaptionRun>,
}

impl SubtitleTimeline {
    pub fn new(fps: u32) -> Self {
        Self {
            fps,
            current_caption: None,
            run_start_frame: 0,
            current_frame: 0,
            runs: vec![],
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn frames(&self) -> u64 {
        self.current_frame
    }

    pub fn push_frame(&mut self, caption: impl Into<String>) {
        let caption = caption.into();

        match self.current_caption.take() {
            Some(current) if current != caption => {
                self.runs.push(CaptionRun {
                    start_frame: self.run_start_frame,
                    end_frame: self.current_frame,
                    text: current,
                });
                self.run_start_frame = self.current_frame;
            }
            _ => {}
        }

        self.current_caption = Some(caption);
        self.current_frame += 1;
    }

    pub fn finish(mut self) -> Vec<CaptionRun> {
        if let Some(current) = self.current_caption.take() {
            self.runs.push(CaptionRun {
                start_frame: self.run_start_frame,
                end_frame: self.current_frame,
                text: current,
            });
        }

        self.runs
    }

    /// Convenience for `runs_to_subtitles(self.finish(), fps)`.
    pub fn into_subtitles(self) -> Vec<Subtitle> {
        let fps = self.fps;
        runs_to_subtitles(&self.finish(), fps)
    }
}

/// Presentation time of `frame` in milliseconds, kept exact for whole seconds.
pub fn frame_to_ms(frame: u64, fps: u32) -> u64 {
    let fps = fps.max(1) as u64;
    (frame / fps) * 1000 + (frame % fps) * 1000 / fps
}

pub fn runs_to_subtitles(runs: &[CaptionRun], fps: u32) -> Vec<Subtitle> {
    runs.iter()
        .enumerate()
        .map(|(i, run)| Subtitle {
            index: i as u32 + 1,
            start_timestamp: frame_to_ms(run.start_frame, fps),
            end_timestamp: frame_to_ms(run.end_frame, fps),
            text: run.text.clone(),
        })
        .collect()
}

/// `HH:MM:SS,mmm`, hours grow past two digits when needed.
pub fn ms_to_srt_timestamp(milliseconds: u64) -> String {
    let total_seconds = milliseconds / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = milliseconds % 1000;

    format!(
        "{:02}:{:02}:{:02},{:03}",
        hours, minutes, seconds, millis
    )
}

pub fn subtitle_to_srt(subtitle: &Subtitle) -> String {
    format!(
        "{}\n{} --> {}\n{}",
        subtitle.index,
        ms_to_srt_timestamp(subtitle.start_timestamp),
        ms_to_srt_timestamp(subtitle.end_timestamp),
        subtitle.text
    )
}

pub fn subtitles_to_srt(subtitle: &[Subtitle]) -> String {
    subtitle
        .iter()
        .map(|item| format!("{}\n\n", subtitle_to_srt(item)))
        .collect::<String>()
}

pub fn save_as_srt(subtitle: &[Subtitle], path: impl AsRef<Path>) -> Result<()> {
    fs::write(path.as_ref(), subtitles_to_srt(subtitle))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_captions_make_one_run() {
        let mut timeline = SubtitleTimeline::new(2);
        for _ in 0..5 {
            timeline.push_frame("12:00:00");
        }

        assert_eq!(
            timeline.finish(),
            vec![CaptionRun {
                start_frame: 0,
                end_frame: 5,
                text: "12:00:00".to_string()
            }]
        );
    }

    #[test]
    fn test_distinct_captions_make_single_frame_runs() {
        let mut timeline = SubtitleTimeline::new(2);
        for caption in ["a", "b", "c", "d"] {
            timeline.push_frame(caption);
        }

        let runs = timeline.finish();
        assert_eq!(runs.len(), 4);
        for (i, run) in runs.iter().enumerate() {
            assert_eq!(run.start_frame, i as u64);
            assert_eq!(run.end_frame, i as u64 + 1);
        }
    }

    #[test]
    fn test_runs_are_contiguous() {
        let captions = ["a", "a", "b", "a", "a", "a", "c", "c"];
        let mut timeline = SubtitleTimeline::new(3);
        for caption in captions {
            timeline.push_frame(caption);
        }
        assert_eq!(timeline.frames(), captions.len() as u64);

        let runs = timeline.finish();
        assert_eq!(runs.len(), 4);
        assert_eq!(runs[0].start_frame, 0);
        assert_eq!(runs.last().unwrap().end_frame, captions.len() as u64);
        for pair in runs.windows(2) {
            assert_eq!(pair[0].end_frame, pair[1].start_frame);
            assert_ne!(pair[0].text, pair[1].text);
        }
    }

    #[test]
    fn test_empty_timeline() {
        assert!(SubtitleTimeline::new(2).finish().is_empty());
    }

    #[test]
    fn test_frame_to_ms() {
        assert_eq!(frame_to_ms(0, 2), 0);
        assert_eq!(frame_to_ms(1, 2), 500);
        assert_eq!(frame_to_ms(5, 2), 2500);
        assert_eq!(frame_to_ms(1, 3), 333);
        assert_eq!(frame_to_ms(3, 3), 1000);
        assert_eq!(frame_to_ms(7, 3), 2333);
        assert_eq!(frame_to_ms(180 * 30, 30), 180_000);
    }

    #[test]
    fn test_ms_to_srt_timestamp() {
        assert_eq!(ms_to_srt_timestamp(0), "00:00:00,000");
        assert_eq!(ms_to_srt_timestamp(2500), "00:00:02,500");
        assert_eq!(ms_to_srt_timestamp(3_723_004), "01:02:03,004");
        assert_eq!(ms_to_srt_timestamp(100 * 3600 * 1000), "100:00:00,000");
    }

    #[test]
    fn test_subtitle_to_srt() {
        let subtitle = Subtitle {
            index: 2,
            start_timestamp: 500,
            end_timestamp: 1500,
            text: "13:20:30".to_string(),
        };

        assert_eq!(
            subtitle_to_srt(&subtitle),
            "2\n00:00:00,500 --> 00:00:01,500\n13:20:30"
        );
    }
}
