//! Production [`Player`] backed by the default audio device
//!
//! Each `play` from stopped opens a session:
//!
//! ```text
//! decode thread: TrackDecoder → remap channels → StreamResampler ─► ring (HeapRb)
//! audio thread:                                     cpal callback ◄─┘
//! ```
//!
//! Events travel back to the event loop over an unbounded channel, tagged
//! with the session generation so events of a stopped session are dropped.
//! End of stream is reported only after the ring has drained.

use crate::audio::decoder::TrackDecoder;
use crate::audio::output::{self, remap_channels, AudioOutput};
use crate::audio::resampler::StreamResampler;
use crate::error::{Error, Result};
use crate::playback::{Player, PlayerEvent, TrackRef};
use cpal::traits::StreamTrait;
use cpal::Stream;
use ringbuf::traits::{Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Ring capacity in milliseconds of output audio
const RING_MS: usize = 500;

/// Back-off while the ring is full or draining
const FEED_WAIT: Duration = Duration::from_millis(10);

type Tagged = (u64, PlayerEvent);

struct Session {
    generation: u64,
    stream: Stream,
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        if let Err(e) = self.stream.pause() {
            debug!("Pause on teardown failed: {}", e);
        }
        // The feeder notices `stopped` within one FEED_WAIT
        if let Some(feeder) = self.feeder.take() {
            if feeder.join().is_err() {
                warn!("Decode thread panicked");
            }
        }
    }
}

pub struct AudioPlayer {
    loaded: Option<TrackRef>,
    session: Option<Session>,
    generation: u64,
    events_tx: UnboundedSender<Tagged>,
    events_rx: UnboundedReceiver<Tagged>,
}

impl AudioPlayer {
    /// No device is opened until the first `play`
    pub fn new() -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            loaded: None,
            session: None,
            generation: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn loaded(&self) -> Option<&TrackRef> {
        self.loaded.as_ref()
    }

    fn start_session(&mut self, track: &TrackRef) -> Result<Session> {
        let decoder = TrackDecoder::open(track.path())?;
        let output = AudioOutput::open_default(decoder.sample_rate())?;

        let capacity = (output.sample_rate() as usize * output.channels() * RING_MS / 1000).max(4096);
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();

        self.generation += 1;
        let generation = self.generation;
        let paused = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(AtomicBool::new(false));

        let errors = self.events_tx.clone();
        let stream = output.build(consumer, Arc::clone(&paused), move |err| {
            let _ = errors.send((
                generation,
                PlayerEvent::Error {
                    error: "Audio output failed".to_string(),
                    detail: Some(err.to_string()),
                },
            ));
        })?;

        let resampler = if decoder.sample_rate() != output.sample_rate() {
            Some(StreamResampler::new(
                decoder.sample_rate(),
                output.sample_rate(),
                output.channels(),
            )?)
        } else {
            None
        };

        let feeder = Feeder {
            decoder,
            resampler,
            producer,
            out_channels: output.channels(),
            stopped: Arc::clone(&stopped),
            events: self.events_tx.clone(),
            generation,
        };
        let handle = thread::Builder::new()
            .name("jukebox-decoder".to_string())
            .spawn(move || feeder.run())?;

        let session = Session {
            generation,
            stream,
            paused,
            stopped,
            feeder: Some(handle),
        };
        output::start(&session.stream)?;
        Ok(session)
    }
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Player for AudioPlayer {
    fn load(&mut self, track: &TrackRef) -> Result<()> {
        self.stop()?;
        debug!("Loaded {}", track);
        self.loaded = Some(track.clone());
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if let Some(session) = &self.session {
            session.paused.store(false, Ordering::Release);
            return output::start(&session.stream);
        }

        let track = self
            .loaded
            .clone()
            .ok_or_else(|| Error::Player("No track loaded".to_string()))?;
        let session = self.start_session(&track)?;
        info!("Audio session {} started for {}", session.generation, track);
        self.session = Some(session);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if let Some(session) = &self.session {
            session.paused.store(true, Ordering::Release);
            // Not every host can pause; the callback already outputs silence
            if let Err(e) = session.stream.pause() {
                debug!("Stream pause unsupported: {}", e);
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            debug!("Stopping audio session {}", session.generation);
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Option<PlayerEvent> {
        let current = self.session.as_ref().map(|s| s.generation);
        while let Ok((generation, event)) = self.events_rx.try_recv() {
            if Some(generation) == current {
                return Some(event);
            }
            debug!("Dropped stale event from session {}: {:?}", generation, event);
        }
        None
    }
}

/// Decode thread state
struct Feeder {
    decoder: TrackDecoder,
    resampler: Option<StreamResampler>,
    producer: HeapProd<f32>,
    out_channels: usize,
    stopped: Arc<AtomicBool>,
    events: UnboundedSender<Tagged>,
    generation: u64,
}

impl Feeder {
    fn run(mut self) {
        match self.feed() {
            Ok(true) => {
                debug!("Session {} reached end of stream", self.generation);
                self.send(PlayerEvent::EndOfStream);
            }
            Ok(false) => {}
            Err(e) => self.send(PlayerEvent::Error {
                error: "Decoding failed".to_string(),
                detail: Some(e.to_string()),
            }),
        }
    }

    /// Push the whole track; false if stopped first
    fn feed(&mut self) -> Result<bool> {
        loop {
            let Some(block) = self.decoder.next_block()? else {
                break;
            };
            let block = remap_channels(&block, self.decoder.channels(), self.out_channels);
            let block = match self.resampler.as_mut() {
                Some(resampler) => resampler.process(&block)?,
                None => block,
            };
            if !self.push_all(&block) {
                return Ok(false);
            }
        }

        if let Some(resampler) = self.resampler.as_mut() {
            let tail = resampler.flush()?;
            if !self.push_all(&tail) {
                return Ok(false);
            }
        }

        while self.producer.occupied_len() > 0 {
            if self.is_stopped() {
                return Ok(false);
            }
            thread::sleep(FEED_WAIT);
        }
        Ok(!self.is_stopped())
    }

    fn push_all(&mut self, mut samples: &[f32]) -> bool {
        while !samples.is_empty() {
            if self.is_stopped() {
                return false;
            }
            let pushed = self.producer.push_slice(samples);
            samples = &samples[pushed..];
            if pushed == 0 {
                thread::sleep(FEED_WAIT);
            }
        }
        true
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn send(&self, event: PlayerEvent) {
        let _ = self.events.send((self.generation, event));
    }
}
