//! Audio decoding and assembly.

pub mod assembler;
pub mod segment;

pub use assembler::{AssembledAudio, DEFAULT_PAUSE_MS, Ffmpeg, OutputPlan, assemble};
pub use segment::AudioSegment;
