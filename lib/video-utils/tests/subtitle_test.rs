// cargo test -p video-utils --test subtitle_test

use std::fs;
use video_utils::subtitle::{
    SubtitleTimeline, ms_to_srt_timestamp, runs_to_subtitles, save_as_srt,
};

#[test]
fn test_timeline_to_srt_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("subtitles.srt");

    // 2 fps, the middle caption repeats over two frames
    let mut timeline = SubtitleTimeline::new(2);
    for caption in ["13:20:30", "13:20:35", "13:20:35", "13:20:40"] {
        timeline.push_frame(caption);
    }
    save_as_srt(&timeline.into_subtitles(), &path)?;

    let contents = fs::read_to_string(&path)?;
    assert_eq!(
        contents,
        "1\n00:00:00,000 --> 00:00:00,500\n13:20:30\n\n\
         2\n00:00:00,500 --> 00:00:01,500\n13:20:35\n\n\
         3\n00:00:01,500 --> 00:00:02,000\n13:20:40\n\n"
    );

    Ok(())
}

#[test]
fn test_srt_cues_cover_all_frames() -> anyhow::Result<()> {
    let fps = 3;
    let mut timeline = SubtitleTimeline::new(fps);
    for i in 0..100u32 {
        timeline.push_frame(format!("caption {}", i / 7));
    }
    let runs = timeline.finish();
    let subtitles = runs_to_subtitles(&runs, fps);

    assert_eq!(subtitles.len(), 15);
    assert_eq!(subtitles[0].index, 1);
    assert_eq!(subtitles[0].start_timestamp, 0);
    for pair in subtitles.windows(2) {
        assert_eq!(pair[0].end_timestamp, pair[1].start_timestamp);
        assert_eq!(pair[0].index + 1, pair[1].index);
    }

    let last = subtitles.last().unwrap();
    assert_eq!(last.end_timestamp, 33_333);
    assert_eq!(ms_to_srt_timestamp(last.end_timestamp), "00:00:33,333");

    Ok(())
}
