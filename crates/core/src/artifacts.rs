use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{ArtifactPair, ArtifactRef};
use crate::report::Reporter;
use crate::transcode::{FfmpegCommand, GenerationError, Transcoder};

pub const PREVIEW_DIR: &str = "preview";
pub const THUMBNAIL_SUFFIX: &str = "_thumb";
pub const THUMBNAIL_EXT: &str = "jpg";
pub const CLIP_EXT: &str = "gif";

pub const FRAME_WIDTH: u32 = 480;
pub const FRAME_HEIGHT: u32 = 270;
/// Thumbnail frame position as a fraction of the duration.
pub const THUMBNAIL_POSITION: f64 = 0.1;
/// Clip start as a fraction of the duration.
pub const CLIP_POSITION: f64 = 0.5;
pub const CLIP_SECONDS: f64 = 2.0;
pub const CLIP_FPS: u32 = 10;
pub const JPEG_QUALITY: u8 = 6;

pub fn thumbnail_file_name(id: &str) -> String {
    format!("{id}{THUMBNAIL_SUFFIX}.{THUMBNAIL_EXT}")
}

pub fn clip_file_name(id: &str) -> String {
    format!("{id}.{CLIP_EXT}")
}

/// `clamp(fraction * duration, 0, duration)`.
pub fn seek_position(duration: f64, fraction: f64) -> f64 {
    let duration = duration.max(0.0);
    (duration * fraction).clamp(0.0, duration)
}

/// Scale to fit the frame, keeping aspect ratio, then pad centred.
pub fn frame_filter() -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = FRAME_WIDTH,
        h = FRAME_HEIGHT
    )
}

pub struct ArtifactGenerator {
    preview_dir: PathBuf,
    url_prefix: String,
    transcoder: Arc<dyn Transcoder>,
}

impl ArtifactGenerator {
    pub fn new(
        preview_dir: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            preview_dir: preview_dir.into(),
            url_prefix: url_prefix.into(),
            transcoder,
        }
    }

    pub fn preview_dir(&self) -> &Path {
        &self.preview_dir
    }

    pub fn thumbnail_ref(&self, id: &str) -> ArtifactRef {
        self.reference(thumbnail_file_name(id))
    }

    pub fn clip_ref(&self, id: &str) -> ArtifactRef {
        self.reference(clip_file_name(id))
    }

    fn reference(&self, file_name: String) -> ArtifactRef {
        ArtifactRef {
            path: self.preview_dir.join(&file_name),
            url: format!(
                "{}/{PREVIEW_DIR}/{file_name}",
                self.url_prefix.trim_end_matches('/')
            ),
        }
    }

    /// What is on disk right now for `id`.
    pub fn existing(&self, id: &str) -> ArtifactPair {
        let present = |r: ArtifactRef| r.path.is_file().then_some(r);
        ArtifactPair {
            thumbnail: present(self.thumbnail_ref(id)),
            clip: present(self.clip_ref(id)),
        }
    }

    pub fn thumbnail_command(&self, video: &Path, id: &str, duration: f64) -> FfmpegCommand {
        FfmpegCommand::new(video, self.thumbnail_ref(id).path)
            .seek(seek_position(duration, THUMBNAIL_POSITION))
            .single_frame()
            .video_filter(frame_filter())
            .output_arg("-q:v")
            .output_arg(JPEG_QUALITY.to_string())
            .log_level("error")
    }

    pub fn clip_command(&self, video: &Path, id: &str, duration: f64) -> FfmpegCommand {
        FfmpegCommand::new(video, self.clip_ref(id).path)
            .seek(seek_position(duration, CLIP_POSITION))
            .duration(CLIP_SECONDS)
            .video_filter(format!("fps={CLIP_FPS},{}", frame_filter()))
            .video_codec("gif")
            .output_arg("-loop")
            .output_arg("0")
            .log_level("error")
    }

    pub async fn thumbnail(
        &self,
        video: &Path,
        id: &str,
        duration: f64,
        reporter: &Reporter,
    ) -> Result<ArtifactRef, GenerationError> {
        let cmd = self.thumbnail_command(video, id, duration);
        self.render(cmd, self.thumbnail_ref(id), "thumbnail", id, reporter)
            .await
    }

    pub async fn clip(
        &self,
        video: &Path,
        id: &str,
        duration: f64,
        reporter: &Reporter,
    ) -> Result<ArtifactRef, GenerationError> {
        let cmd = self.clip_command(video, id, duration);
        self.render(cmd, self.clip_ref(id), "preview clip", id, reporter)
            .await
    }

    async fn render(
        &self,
        cmd: FfmpegCommand,
        target: ArtifactRef,
        kind: &str,
        id: &str,
        reporter: &Reporter,
    ) -> Result<ArtifactRef, GenerationError> {
        match self.produce(&cmd, &target).await {
            Ok(meta) => {
                reporter.success(format!(
                    "Generated {kind} for {id}: {} ({:.2} KB)",
                    target.path.display(),
                    meta.len() as f64 / 1024.0
                ));
                Ok(target)
            }
            Err(e) => {
                reporter.error(format!("Failed to generate {kind} for {id}: {e}"));
                Err(e)
            }
        }
    }

    /// Renders into a staging file and renames it over `target` only on success,
    /// so a failed run never leaves a file that `existing` would accept.
    async fn produce(
        &self,
        cmd: &FfmpegCommand,
        target: &ArtifactRef,
    ) -> Result<std::fs::Metadata, GenerationError> {
        tokio::fs::create_dir_all(&self.preview_dir).await?;
        let staging = staging_path(&target.path);
        let staged = cmd.clone().with_output(&staging);
        match self.render_staged(&staged, &staging, &target.path).await {
            Ok(meta) => Ok(meta),
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                Err(e)
            }
        }
    }

    async fn render_staged(
        &self,
        cmd: &FfmpegCommand,
        staging: &Path,
        target: &Path,
    ) -> Result<std::fs::Metadata, GenerationError> {
        self.transcoder.run(cmd).await?;
        if tokio::fs::metadata(staging).await.is_err() {
            return Err(GenerationError::MissingOutput(target.to_path_buf()));
        }
        tokio::fs::rename(staging, target).await?;
        Ok(tokio::fs::metadata(target).await?)
    }
}

/// `<stem>.part.<ext>` next to `path`; the extension is kept so ffmpeg picks
/// the right muxer.
pub fn staging_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.part.{}", ext.to_string_lossy()),
        None => format!("{stem}.part"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::FfmpegTranscoder;

    fn generator(dir: &Path) -> ArtifactGenerator {
        ArtifactGenerator::new(
            dir.join(PREVIEW_DIR),
            "/thumbnails/",
            Arc::new(FfmpegTranscoder::default()),
        )
    }

    #[test]
    fn seek_position_is_clamped_to_duration() {
        assert!((seek_position(8.0, THUMBNAIL_POSITION) - 0.8).abs() < 1e-9);
        assert!((seek_position(8.0, CLIP_POSITION) - 4.0).abs() < 1e-9);
        assert_eq!(seek_position(0.0, CLIP_POSITION), 0.0);
        assert_eq!(seek_position(-3.0, CLIP_POSITION), 0.0);
        assert_eq!(seek_position(10.0, 1.5), 10.0);
    }

    #[test]
    fn references_follow_naming_scheme() {
        let temp = tempfile::tempdir().unwrap();
        let gen = generator(temp.path());
        let thumb = gen.thumbnail_ref("a");
        assert_eq!(thumb.url, "/thumbnails/preview/a_thumb.jpg");
        assert_eq!(thumb.path, temp.path().join("preview").join("a_thumb.jpg"));
        assert_eq!(gen.clip_ref("a").url, "/thumbnails/preview/a.gif");
    }

    #[test]
    fn commands_carry_fixed_policy() {
        let temp = tempfile::tempdir().unwrap();
        let gen = generator(temp.path());

        let thumb = gen.thumbnail_command(Path::new("v/a.mp4"), "a", 8.0).build_args();
        let filter = frame_filter();
        assert!(thumb.windows(2).any(|w| w[0] == "-ss" && w[1] == "0.800"));
        assert!(thumb.windows(2).any(|w| w[0] == "-vframes" && w[1] == "1"));
        assert!(thumb.windows(2).any(|w| w[0] == "-vf" && w[1] == filter));
        assert!(thumb.windows(2).any(|w| w[0] == "-q:v" && w[1] == "6"));

        let clip = gen.clip_command(Path::new("v/a.mp4"), "a", 8.0).build_args();
        assert!(clip.windows(2).any(|w| w[0] == "-ss" && w[1] == "4.000"));
        assert!(clip.windows(2).any(|w| w[0] == "-t" && w[1] == "2.000"));
        assert!(clip
            .windows(2)
            .any(|w| w[0] == "-vf" && w[1] == format!("fps=10,{filter}")));
        assert!(clip.windows(2).any(|w| w[0] == "-loop" && w[1] == "0"));
        assert!(clip.last().unwrap().ends_with("a.gif"));
    }

    #[test]
    fn existing_reflects_files_on_disk() {
        let temp = tempfile::tempdir().unwrap();
        let gen = generator(temp.path());
        assert_eq!(gen.existing("a"), ArtifactPair::default());

        std::fs::create_dir_all(gen.preview_dir()).unwrap();
        std::fs::write(gen.thumbnail_ref("a").path, b"jpg").unwrap();
        let pair = gen.existing("a");
        assert!(pair.thumbnail.is_some());
        assert!(pair.clip.is_none());
        assert!(!pair.is_complete());
    }

    #[test]
    fn staging_keeps_the_extension() {
        assert_eq!(
            staging_path(Path::new("p/a_thumb.jpg")),
            PathBuf::from("p/a_thumb.part.jpg")
        );
        assert_eq!(staging_path(Path::new("p/a.gif")), PathBuf::from("p/a.part.gif"));
    }

    struct WritesThenFails;

    #[async_trait::async_trait]
    impl Transcoder for WritesThenFails {
        async fn run(&self, cmd: &FfmpegCommand) -> Result<(), GenerationError> {
            std::fs::write(cmd.output(), b"partial").unwrap();
            Err(GenerationError::Failed {
                stderr: "killed".to_string(),
                exit_code: None,
            })
        }
    }

    #[tokio::test]
    async fn failed_render_leaves_nothing_behind() {
        let temp = tempfile::tempdir().unwrap();
        let gen = ArtifactGenerator::new(temp.path(), "/t", Arc::new(WritesThenFails));

        let err = gen
            .thumbnail(Path::new("a.mp4"), "a", 8.0, &Reporter::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Failed { .. }));
        assert_eq!(gen.existing("a"), ArtifactPair::default());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn filter_pads_to_exact_frame() {
        assert_eq!(
            frame_filter(),
            "scale=480:270:force_original_aspect_ratio=decrease,pad=480:270:(ow-iw)/2:(oh-ih)/2"
        );
    }
}
