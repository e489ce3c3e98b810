//! Joining synthesized segments into the final narration file.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::AudioSegment;
use crate::error::{NarrateError, Result};

/// Silence inserted after every segment.
pub const DEFAULT_PAUSE_MS: u32 = 700;

/// Container written for the final artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Mp3,
    Wav,
}

impl OutputFormat {
    /// Pick the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("mp3") => Ok(Self::Mp3),
            Some("wav") => Ok(Self::Wav),
            _ => Err(NarrateError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mp3",
            Self::Wav => "audio/wav",
        }
    }
}

/// Location of the ffmpeg binary used for MP3 encoding.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

impl Ffmpeg {
    /// Use an explicit binary, or `ffmpeg` from `PATH`.
    pub fn new(program: Option<PathBuf>) -> Self {
        program.map(|program| Self { program }).unwrap_or_default()
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }

    pub fn is_available(&self) -> bool {
        self.command()
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Encode a WAV file to MP3.
    pub fn encode_mp3(&self, input: &Path, output: &Path) -> Result<()> {
        let result = self
            .command()
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-codec:a", "libmp3lame", "-b:a", "128k"])
            .arg(output)
            .output()
            .map_err(|e| {
                NarrateError::Ffmpeg(format!("could not run {}: {}", self.program.display(), e))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(NarrateError::Ffmpeg(stderr.trim().to_string()));
        }

        Ok(())
    }
}

/// The written narration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledAudio {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub duration_ms: u64,
}

impl AssembledAudio {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Concatenate segments in order, each followed by `pause_ms` of silence.
///
/// The result uses the first segment's sample rate and channel count.
pub fn join_segments(segments: &[AudioSegment], pause_ms: u32) -> Result<AudioSegment> {
    let first = segments.first().ok_or(NarrateError::NoAudioProduced)?;

    let mut combined = AudioSegment::new(first.sample_rate(), first.channels(), Vec::new());
    for segment in segments {
        combined.append(segment);
        combined.append_silence(pause_ms);
    }

    Ok(combined)
}

/// Where the narration goes, settled before any audio is synthesized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    /// Explicit destination; a temporary `narration-*` file otherwise
    pub path: Option<PathBuf>,
    pub format: OutputFormat,
}

impl OutputPlan {
    /// Check the output path and encoder up front.
    ///
    /// An explicit path must end in `.mp3` or `.wav`, and `.mp3` needs a
    /// working ffmpeg. Without a path the output is MP3 when ffmpeg is
    /// available and WAV otherwise.
    pub fn resolve(output: Option<&Path>, ffmpeg: &Ffmpeg) -> Result<Self> {
        let format = match output {
            Some(path) => {
                let format = OutputFormat::from_path(path)?;
                if format == OutputFormat::Mp3 && !ffmpeg.is_available() {
                    return Err(NarrateError::Ffmpeg(format!(
                        "{} not found, MP3 output needs ffmpeg",
                        ffmpeg.program.display()
                    )));
                }
                format
            }
            None if ffmpeg.is_available() => OutputFormat::Mp3,
            None => {
                log::warn!("ffmpeg not found, writing WAV instead of MP3");
                OutputFormat::Wav
            }
        };

        Ok(Self {
            path: output.map(Path::to_path_buf),
            format,
        })
    }
}

/// Join segments and write the result as `plan` describes.
///
/// Nothing is written when there are no segments. A temporary output file
/// is removed again if writing it fails.
pub fn assemble(
    segments: &[AudioSegment],
    pause_ms: u32,
    plan: &OutputPlan,
    ffmpeg: &Ffmpeg,
) -> Result<AssembledAudio> {
    let combined = join_segments(segments, pause_ms)?;

    let (path, temporary) = match &plan.path {
        Some(path) => (path.clone(), false),
        None => (temporary_output_path(plan.format)?, true),
    };

    if let Err(e) = write_output(&combined, &path, plan.format, ffmpeg) {
        if temporary {
            if let Err(remove) = std::fs::remove_file(&path) {
                log::debug!("could not remove {}: {}", path.display(), remove);
            }
        }
        return Err(e);
    }

    log::info!(
        "wrote {} ({} ms, {})",
        path.display(),
        combined.duration_ms(),
        plan.format.mime_type()
    );

    Ok(AssembledAudio {
        path,
        format: plan.format,
        duration_ms: combined.duration_ms(),
    })
}

fn write_output(
    combined: &AudioSegment,
    path: &Path,
    format: OutputFormat,
    ffmpeg: &Ffmpeg,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match format {
        OutputFormat::Wav => combined.save_wav(path),
        OutputFormat::Mp3 => {
            let staging = tempfile::Builder::new()
                .prefix("narration-")
                .suffix(".wav")
                .tempfile()?;
            combined.save_wav(staging.path())?;
            ffmpeg.encode_mp3(staging.path(), path)
        }
    }
}

/// Create an empty file in the temp directory that outlives the process.
pub fn temporary_output_path(format: OutputFormat) -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("narration-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile()?;
    let (_, path) = file.keep().map_err(|e| NarrateError::Io(e.error))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn segment(sample_rate: u32, duration_ms: u32) -> AudioSegment {
        let frames = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
        AudioSegment::new(sample_rate, 1, vec![1000; frames])
    }

    fn wav_duration_ms(path: &Path) -> u64 {
        let reader = hound::WavReader::open(path).unwrap();
        reader.duration() as u64 * 1000 / reader.spec().sample_rate as u64
    }

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(
            OutputFormat::from_path(Path::new("out.mp3")).unwrap(),
            OutputFormat::Mp3
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("OUT.WAV")).unwrap(),
            OutputFormat::Wav
        );
        assert!(OutputFormat::from_path(Path::new("out.ogg")).is_err());
        assert!(OutputFormat::from_path(Path::new("out")).is_err());
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(OutputFormat::Mp3.mime_type(), "audio/mp3");
        assert_eq!(OutputFormat::Wav.mime_type(), "audio/wav");
    }

    #[test]
    fn test_join_adds_pause_after_every_segment() {
        let joined = join_segments(&[segment(16_000, 500), segment(16_000, 1200)], 700).unwrap();
        assert_eq!(joined.duration_ms(), 500 + 700 + 1200 + 700);

        // Pause follows the first segment's audio
        let first_pause = &joined.samples()[8000..8000 + 11_200];
        assert!(first_pause.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_join_uses_first_segment_format() {
        let joined = join_segments(&[segment(24_000, 300), segment(16_000, 300)], 0).unwrap();
        assert_eq!(joined.sample_rate(), 24_000);
        assert_eq!(joined.duration_ms(), 600);
    }

    fn wav_plan(path: &Path) -> OutputPlan {
        OutputPlan::resolve(Some(path), &Ffmpeg::default()).unwrap()
    }

    fn missing_ffmpeg() -> Ffmpeg {
        Ffmpeg::new(Some(PathBuf::from("/nonexistent/ffmpeg-binary")))
    }

    #[test]
    fn test_assemble_wav_duration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("narration.wav");

        let assembled = assemble(
            &[segment(16_000, 500), segment(16_000, 1200)],
            DEFAULT_PAUSE_MS,
            &wav_plan(&path),
            &Ffmpeg::default(),
        )
        .unwrap();

        assert_eq!(assembled.format, OutputFormat::Wav);
        assert_eq!(assembled.mime_type(), "audio/wav");
        assert_eq!(assembled.duration_ms, 3100);
        assert_eq!(wav_duration_ms(&path), 3100);
    }

    #[test]
    fn test_assemble_no_segments_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("narration.wav");

        let result = assemble(&[], DEFAULT_PAUSE_MS, &wav_plan(&path), &Ffmpeg::default());

        assert!(matches!(result, Err(NarrateError::NoAudioProduced)));
        assert!(!path.exists());
    }

    #[test]
    fn test_assemble_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/narration.wav");

        assemble(&[segment(8000, 100)], 700, &wav_plan(&path), &Ffmpeg::default()).unwrap();
        assert_eq!(wav_duration_ms(&path), 800);
    }

    #[test]
    fn test_resolve_rejects_unsupported_extension() {
        let result = OutputPlan::resolve(Some(Path::new("out.ogg")), &Ffmpeg::default());
        assert!(matches!(result, Err(NarrateError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_resolve_mp3_needs_ffmpeg() {
        let ffmpeg = missing_ffmpeg();
        assert!(!ffmpeg.is_available());

        let result = OutputPlan::resolve(Some(Path::new("out.mp3")), &ffmpeg);
        assert!(matches!(result, Err(NarrateError::Ffmpeg(_))));

        // WAV output never touches ffmpeg
        let plan = OutputPlan::resolve(Some(Path::new("out.wav")), &ffmpeg).unwrap();
        assert_eq!(plan.format, OutputFormat::Wav);
    }

    #[test]
    fn test_resolve_default_falls_back_to_wav() {
        let plan = OutputPlan::resolve(None, &missing_ffmpeg()).unwrap();
        assert_eq!(plan.path, None);
        assert_eq!(plan.format, OutputFormat::Wav);
    }

    #[test]
    fn test_missing_ffmpeg_reports_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("narration.mp3");
        let plan = OutputPlan {
            path: Some(path.clone()),
            format: OutputFormat::Mp3,
        };

        let result = assemble(&[segment(8000, 100)], 700, &plan, &missing_ffmpeg());
        assert!(matches!(result, Err(NarrateError::Ffmpeg(_))));
    }

    fn temporary_mp3s() -> HashSet<PathBuf> {
        std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                name.starts_with("narration-") && name.ends_with(".mp3")
            })
            .collect()
    }

    #[test]
    fn test_failed_encode_removes_temporary_output() {
        let before = temporary_mp3s();
        let plan = OutputPlan {
            path: None,
            format: OutputFormat::Mp3,
        };

        let result = assemble(&[segment(8000, 100)], 700, &plan, &missing_ffmpeg());

        assert!(matches!(result, Err(NarrateError::Ffmpeg(_))));
        let leftover: Vec<_> = temporary_mp3s().difference(&before).cloned().collect();
        assert!(leftover.is_empty(), "left behind {:?}", leftover);
    }

    #[test]
    fn test_temporary_output_path_persists() {
        let path = temporary_output_path(OutputFormat::Wav).unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("narration-"));
        assert!(name.ends_with(".wav"));
        std::fs::remove_file(path).unwrap();
    }
}
