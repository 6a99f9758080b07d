pub mod file;
pub mod mic;
pub mod source;

pub use file::{AudioFile, FileSource};
pub use mic::{MicConfig, MicSource};
pub use source::{AudioBuffer, AudioSegment, AudioSource, CaptureError};
