use std::path::{Path, PathBuf};

use showreel::error::{ShowreelError, ShowreelResult};
use showreel::extract::{
    VideoDecoder, VideoInfo, VideoToFramesConfig, discover_jobs, videos_to_frames,
};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "showreel_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

/// Yields three solid 8x8 frames per video; any video whose path mentions
/// "corrupt" fails mid-decode.
struct StubDecoder;

impl VideoDecoder for StubDecoder {
    fn probe(&self, video: &Path) -> ShowreelResult<VideoInfo> {
        let _ = video;
        Ok(VideoInfo {
            width: 8,
            height: 8,
        })
    }

    fn decode_rgb_frames(
        &self,
        video: &Path,
        info: VideoInfo,
        on_frame: &mut dyn FnMut(&[u8]) -> ShowreelResult<()>,
    ) -> ShowreelResult<()> {
        let frame = vec![200u8; info.width as usize * info.height as usize * 3];
        on_frame(&frame)?;
        if video.to_string_lossy().contains("corrupt") {
            return Err(ShowreelError::resource(format!(
                "truncated stream in '{}'",
                video.display()
            )));
        }
        on_frame(&frame)?;
        on_frame(&frame)?;
        Ok(())
    }
}

fn make_input_tree(root: &Path, names: &[&str]) {
    for name in names {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("video.mp4"), b"not a real mp4").unwrap();
    }
    // A subdirectory without a video is not a job.
    std::fs::create_dir_all(root.join("empty")).unwrap();
}

#[test]
fn discovery_finds_only_video_subdirs_in_order() {
    let input = temp_dir("extract_discover");
    make_input_tree(&input, &["chair_b", "chair_a"]);
    let output = temp_dir("extract_discover_out");

    let jobs = discover_jobs(&VideoToFramesConfig::new(&input, &output)).unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].video, input.join("chair_a").join("video.mp4"));
    assert_eq!(jobs[0].frame_dir, output.join("chair_a"));
    assert_eq!(jobs[1].video, input.join("chair_b").join("video.mp4"));

    std::fs::remove_dir_all(&input).ok();
}

#[test]
fn one_corrupt_video_does_not_sink_the_batch() {
    let input = temp_dir("extract_isolated");
    make_input_tree(&input, &["lamp", "corrupt_table", "vase"]);
    let output = temp_dir("extract_isolated_out");

    let config = VideoToFramesConfig::new(&input, &output).with_threads(2);
    let summary = videos_to_frames(&config, &StubDecoder).unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);

    for name in ["lamp", "vase"] {
        for frame in ["0000.jpg", "0001.jpg", "0002.jpg"] {
            assert!(
                output.join(name).join(frame).is_file(),
                "missing {name}/{frame}"
            );
        }
        assert!(!output.join(name).join("0003.jpg").exists());
    }

    std::fs::remove_dir_all(&input).ok();
    std::fs::remove_dir_all(&output).ok();
}

#[test]
fn bad_crop_ratio_aborts_before_any_output() {
    let input = temp_dir("extract_badratio");
    make_input_tree(&input, &["lamp"]);
    let output = temp_dir("extract_badratio_out");

    let config = VideoToFramesConfig::new(&input, &output).with_crop_ratio(2.0);
    let err = videos_to_frames(&config, &StubDecoder).unwrap_err();
    assert!(err.to_string().contains("crop_ratio"));
    assert!(!output.exists());

    std::fs::remove_dir_all(&input).ok();
}

#[test]
fn crop_trims_the_written_stills() {
    let input = temp_dir("extract_crop");
    make_input_tree(&input, &["lamp"]);
    let output = temp_dir("extract_crop_out");

    let config = VideoToFramesConfig::new(&input, &output).with_crop_ratio(0.5);
    let summary = videos_to_frames(&config, &StubDecoder).unwrap();
    assert_eq!(summary.completed, 1);

    let still = image::open(output.join("lamp").join("0000.jpg")).unwrap();
    assert_eq!(still.width(), 4);
    assert_eq!(still.height(), 4);

    std::fs::remove_dir_all(&input).ok();
    std::fs::remove_dir_all(&output).ok();
}
