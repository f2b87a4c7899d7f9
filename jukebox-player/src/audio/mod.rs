//! Audio pipeline: symphonia decode, rubato resample, cpal output

pub mod decoder;
pub mod output;
pub mod player;
pub mod resampler;

pub use decoder::TrackDecoder;
pub use output::AudioOutput;
pub use player::AudioPlayer;
pub use resampler::StreamResampler;
