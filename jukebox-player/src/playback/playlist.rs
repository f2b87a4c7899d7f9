//! Playlist with a wrapping cursor

use crate::error::{Error, Result};
use crate::playback::player::TrackRef;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Ordered, non-empty track list with a current position
///
/// The position is always a valid index. When `shuffle_on_wrap` is set the
/// tracks are permuted every time the cursor wraps back to the first slot,
/// so each cycle plays every track exactly once in a fresh order. The first
/// track of a new cycle never repeats the last track of the previous one.
#[derive(Debug, Clone)]
pub struct Playlist {
    tracks: Vec<TrackRef>,
    position: usize,
    shuffle_on_wrap: bool,
}

impl Playlist {
    /// Create a playlist positioned on the first track
    ///
    /// # Errors
    /// `InvalidConfiguration` if `tracks` is empty
    pub fn new(tracks: Vec<TrackRef>, shuffle_on_wrap: bool) -> Result<Self> {
        if tracks.is_empty() {
            return Err(Error::InvalidConfiguration(
                "You need to specify at least one music file".to_string(),
            ));
        }
        Ok(Self {
            tracks,
            position: 0,
            shuffle_on_wrap,
        })
    }

    pub fn current(&self) -> &TrackRef {
        &self.tracks[self.position]
    }

    /// Move to the next track, reshuffling on wrap-around
    pub fn advance(&mut self) -> &TrackRef {
        self.advance_with(&mut rand::thread_rng())
    }

    /// Same as [`advance`](Self::advance) with a caller-provided RNG
    pub fn advance_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &TrackRef {
        let len = self.tracks.len();
        self.position = (self.position + 1) % len;
        if self.position == 0 && self.shuffle_on_wrap && len > 1 {
            let last = self.tracks[len - 1].clone();
            self.tracks.shuffle(rng);
            // No back-to-back repeat across the cycle boundary
            if self.tracks[0] == last {
                self.tracks.swap(0, rng.gen_range(1..len));
            }
            debug!("Playlist wrapped, reshuffled {} tracks", len);
        }
        &self.tracks[self.position]
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[TrackRef] {
        &self.tracks
    }

    pub fn shuffle_on_wrap(&self) -> bool {
        self.shuffle_on_wrap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn tracks(names: &[&str]) -> Vec<TrackRef> {
        names.iter().map(|n| TrackRef::from(*n)).collect()
    }

    #[test]
    fn test_empty_playlist_rejected() {
        let result = Playlist::new(Vec::new(), false);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_sequential_advance_wraps() {
        let mut playlist = Playlist::new(tracks(&["a.mp3", "b.mp3", "c.mp3"]), false).unwrap();
        assert_eq!(playlist.current(), &TrackRef::from("a.mp3"));
        assert_eq!(playlist.advance(), &TrackRef::from("b.mp3"));
        assert_eq!(playlist.advance(), &TrackRef::from("c.mp3"));
        assert_eq!(playlist.advance(), &TrackRef::from("a.mp3"));
        assert_eq!(playlist.position(), 0);
    }

    #[test]
    fn test_single_track_repeats() {
        let mut playlist = Playlist::new(tracks(&["only.flac"]), true).unwrap();
        for _ in 0..5 {
            assert_eq!(playlist.advance(), &TrackRef::from("only.flac"));
            assert_eq!(playlist.position(), 0);
        }
    }

    /// Each cycle is counted from `current()`: the track at position 0 plus
    /// the `len - 1` advances that follow it. The next advance wraps.
    #[test]
    fn test_shuffled_cycles_cover_every_track() {
        let names = ["1.mp3", "2.mp3", "3.mp3", "4.mp3", "5.mp3", "6.mp3"];
        let original: HashSet<TrackRef> = tracks(&names).into_iter().collect();
        let mut playlist = Playlist::new(tracks(&names), true).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _cycle in 0..10 {
            assert_eq!(playlist.position(), 0);
            let mut seen = HashSet::new();
            seen.insert(playlist.current().clone());
            for _ in 1..playlist.len() {
                let track = playlist.advance_with(&mut rng).clone();
                assert!(playlist.position() < playlist.len());
                assert!(seen.insert(track), "track repeated within one cycle");
            }
            assert_eq!(seen, original);
            playlist.advance_with(&mut rng);
        }
    }

    #[test]
    fn test_wrap_never_repeats_previous_track() {
        let names = ["a", "b", "c"];
        let mut playlist = Playlist::new(tracks(&names), true).unwrap();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut previous = playlist.current().clone();
            for _ in 0..names.len() * 20 {
                let track = playlist.advance_with(&mut rng).clone();
                assert_ne!(track, previous, "seed {} played {:?} twice in a row", seed, track);
                previous = track;
            }
        }
    }

    #[test]
    fn test_two_tracks_alternate_across_wraps() {
        let mut playlist = Playlist::new(tracks(&["a", "b"]), true).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let played: Vec<TrackRef> = (0..10).map(|_| playlist.advance_with(&mut rng).clone()).collect();

        for pair in played.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_shuffle_only_on_wrap() {
        let names = ["a", "b", "c", "d"];
        let mut playlist = Playlist::new(tracks(&names), true).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        // Mid-cycle advances keep the original order
        playlist.advance_with(&mut rng);
        playlist.advance_with(&mut rng);
        playlist.advance_with(&mut rng);
        assert_eq!(playlist.tracks(), tracks(&names).as_slice());

        // Wrapping permutes but keeps the same set
        playlist.advance_with(&mut rng);
        assert_eq!(playlist.position(), 0);
        let reordered: HashSet<_> = playlist.tracks().iter().cloned().collect();
        let expected: HashSet<_> = tracks(&names).into_iter().collect();
        assert_eq!(reordered, expected);
    }
}
