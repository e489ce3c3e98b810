//! In-memory PCM audio: decoding service responses, format conversion and
//! WAV encoding.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{NarrateError, Result};

/// Interleaved 16-bit PCM audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl AudioSegment {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples,
        }
    }

    /// Silence of the given duration.
    #[cfg(test)]
    pub fn silent(sample_rate: u32, channels: u16, duration_ms: u32) -> Self {
        let channels = channels.max(1);
        let frames = silent_frames(sample_rate, duration_ms);
        Self::new(sample_rate, channels, vec![0; frames * channels as usize])
    }

    /// Decode WAV or MP3 bytes as returned by a speech service.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            decode_wav(bytes)
        } else {
            decode_compressed(bytes)
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    #[cfg(test)]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    /// Convert to another sample rate and channel count.
    pub fn conform(&self, sample_rate: u32, channels: u16) -> AudioSegment {
        let channels = channels.max(1);
        if self.sample_rate == sample_rate && self.channels == channels {
            return self.clone();
        }

        let remixed = remix(&self.samples, self.channels, channels);
        let samples = resample(&remixed, channels, self.sample_rate, sample_rate);
        AudioSegment::new(sample_rate, channels, samples)
    }

    /// Append another segment, converting it to this segment's format.
    pub fn append(&mut self, other: &AudioSegment) {
        if other.sample_rate == self.sample_rate && other.channels == self.channels {
            self.samples.extend_from_slice(&other.samples);
        } else {
            let converted = other.conform(self.sample_rate, self.channels);
            self.samples.extend_from_slice(&converted.samples);
        }
    }

    pub fn append_silence(&mut self, duration_ms: u32) {
        let frames = silent_frames(self.sample_rate, duration_ms);
        self.samples
            .resize(self.samples.len() + frames * self.channels as usize, 0);
    }

    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Write as 16-bit WAV.
    fn write_wav<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut wav = hound::WavWriter::new(writer, self.wav_spec()).map_err(encode_error)?;
        for &sample in &self.samples {
            wav.write_sample(sample).map_err(encode_error)?;
        }
        wav.finalize().map_err(encode_error)
    }

    #[cfg(test)]
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_wav(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    pub fn save_wav(&self, path: &Path) -> Result<()> {
        self.write_wav(BufWriter::new(File::create(path)?))
    }
}

fn silent_frames(sample_rate: u32, duration_ms: u32) -> usize {
    (sample_rate as u64 * duration_ms as u64 / 1000) as usize
}

fn encode_error(e: hound::Error) -> NarrateError {
    match e {
        hound::Error::IoError(io) => NarrateError::Io(io),
        other => NarrateError::AudioEncode(other.to_string()),
    }
}

fn decode_error(e: impl std::fmt::Display) -> NarrateError {
    NarrateError::AudioDecode(e.to_string())
}

fn decode_wav(bytes: &[u8]) -> Result<AudioSegment> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(decode_error)?;
    let spec = reader.spec();

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .map_err(decode_error)?,
        (hound::SampleFormat::Int, bits) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| scale_int(v, bits)))
            .collect::<std::result::Result<_, _>>()
            .map_err(decode_error)?,
        (hound::SampleFormat::Float, _) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<_, _>>()
            .map_err(decode_error)?,
    };

    Ok(AudioSegment::new(spec.sample_rate, spec.channels, samples))
}

fn scale_int(value: i32, bits: u16) -> i16 {
    if bits > 16 {
        (value >> (bits - 16)) as i16
    } else {
        (value << (16 - bits)) as i16
    }
}

fn decode_compressed(bytes: &[u8]) -> Result<AudioSegment> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_error)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| NarrateError::AudioDecode("no audio track".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(decode_error)?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count() as u16);
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_error(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count() as u16);

                let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt frames are skipped
            Err(SymphoniaError::DecodeError(e)) => log::debug!("skipping bad frame: {}", e),
            Err(e) => return Err(decode_error(e)),
        }
    }

    match (sample_rate, channels) {
        (Some(rate), Some(channels)) if !samples.is_empty() => {
            Ok(AudioSegment::new(rate, channels, samples))
        }
        _ => Err(NarrateError::AudioDecode("no audio samples".to_string())),
    }
}

/// Change the channel count. Each output frame repeats the average of the
/// input frame.
fn remix(samples: &[i16], from: u16, to: u16) -> Vec<i16> {
    if from == to {
        return samples.to_vec();
    }

    samples
        .chunks_exact(from as usize)
        .flat_map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            let avg = (sum / frame.len() as i32) as i16;
            std::iter::repeat_n(avg, to as usize)
        })
        .collect()
}

/// Linear interpolation resampling of interleaved samples.
fn resample(samples: &[i16], channels: u16, from_rate: u32, to_rate: u32) -> Vec<i16> {
    let channels = channels as usize;
    let frames = samples.len() / channels;
    if from_rate == to_rate || frames == 0 || from_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_frames = (frames as u64 * to_rate as u64 / from_rate as u64) as usize;
    let mut output = Vec::with_capacity(output_frames * channels);

    for i in 0..output_frames {
        let position = i as f64 * ratio;
        let left_frame = (position.floor() as usize).min(frames - 1);
        let right_frame = (left_frame + 1).min(frames - 1);
        let fraction = position - left_frame as f64;

        for c in 0..channels {
            let left = samples[left_frame * channels + c] as f64;
            let right = samples[right_frame * channels + c] as f64;
            output.push((left + (right - left) * fraction).round() as i16);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(sample_rate: u32, channels: u16, duration_ms: u32) -> AudioSegment {
        let frames = silent_frames(sample_rate, duration_ms);
        let samples = (0..frames * channels as usize)
            .map(|i| ((i % 100) as i16 - 50) * 100)
            .collect();
        AudioSegment::new(sample_rate, channels, samples)
    }

    #[test]
    fn test_silent_duration() {
        let silence = AudioSegment::silent(24_000, 1, 700);
        assert_eq!(silence.frames(), 16_800);
        assert_eq!(silence.duration_ms(), 700);
        assert!(silence.samples().iter().all(|&s| s == 0));

        let stereo = AudioSegment::silent(44_100, 2, 700);
        assert_eq!(stereo.samples().len(), 30_870 * 2);
        assert_eq!(stereo.duration_ms(), 700);
    }

    #[test]
    fn test_wav_roundtrip_keeps_format() {
        let original = tone(22_050, 2, 250);
        let bytes = original.to_wav_bytes().unwrap();
        let decoded = AudioSegment::decode(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_float_wav() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for v in [0.0f32, 0.5, -1.0, 2.0] {
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = AudioSegment::decode(&cursor.into_inner()).unwrap();
        assert_eq!(decoded.samples(), &[0, 16_383, -32_767, 32_767]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = AudioSegment::decode(b"<html>rate limited</html>");
        assert!(matches!(result, Err(NarrateError::AudioDecode(_))));
    }

    #[test]
    fn test_conform_channels() {
        let stereo = AudioSegment::new(8000, 2, vec![100, 300, -50, -150]);
        let mono = stereo.conform(8000, 1);
        assert_eq!(mono.samples(), &[200, -100]);

        let back = mono.conform(8000, 2);
        assert_eq!(back.samples(), &[200, 200, -100, -100]);
    }

    #[test]
    fn test_conform_sample_rate_preserves_duration() {
        let segment = tone(16_000, 1, 500);
        let upsampled = segment.conform(24_000, 1);
        assert_eq!(upsampled.sample_rate(), 24_000);
        assert_eq!(upsampled.duration_ms(), 500);

        let downsampled = segment.conform(8000, 1);
        assert_eq!(downsampled.duration_ms(), 500);
    }

    #[test]
    fn test_append_converts_format() {
        let mut base = AudioSegment::silent(16_000, 1, 100);
        base.append(&tone(8000, 2, 200));
        assert_eq!(base.sample_rate(), 16_000);
        assert_eq!(base.channels(), 1);
        assert_eq!(base.duration_ms(), 300);
    }

    #[test]
    fn test_append_silence() {
        let mut segment = tone(8000, 2, 100);
        segment.append_silence(700);
        assert_eq!(segment.duration_ms(), 800);
        assert_eq!(segment.samples().len() % 2, 0);
    }

    #[test]
    fn test_save_wav_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        tone(8000, 1, 50).save_wav(&path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.duration(), 400);
    }
}
