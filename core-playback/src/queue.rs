//! # Queue
//!
//! An ordered, copy-on-write list of tracks. Shuffling and restoring produce
//! new [`Queue`] values; a queue a caller already holds is never mutated.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use core_library::Track;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// What happens at the end of a track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last track.
    #[default]
    Off,
    /// Replay the current track.
    One,
    /// Wrap around to the first track.
    All,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }

    /// Off → All → One → Off, the order a repeat button cycles through.
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(RepeatMode::Off),
            "one" => Ok(RepeatMode::One),
            "all" => Ok(RepeatMode::All),
            other => Err(format!("Unknown repeat mode: {}", other)),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Queue {
    tracks: Arc<[Track]>,
}

impl Queue {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: tracks.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.tracks.iter()
    }

    /// Position of `track` by `(source, id)` identity.
    pub fn position_of(&self, track: &Track) -> Option<usize> {
        self.tracks.iter().position(|t| t.same_as(track))
    }

    /// Whether both values share the same backing allocation.
    pub fn ptr_eq(&self, other: &Queue) -> bool {
        Arc::ptr_eq(&self.tracks, &other.tracks)
    }

    /// Fisher–Yates shuffle of every track except `pinned`, which is moved to
    /// the front. Without a pinned index the whole queue is shuffled.
    pub fn shuffled<R: Rng + ?Sized>(&self, pinned: Option<usize>, rng: &mut R) -> Queue {
        let mut tracks = self.tracks.to_vec();

        match pinned.filter(|index| *index < tracks.len()) {
            Some(index) => {
                tracks.swap(0, index);
                tracks[1..].shuffle(rng);
            }
            None => tracks.shuffle(rng),
        }

        Queue::new(tracks)
    }
}

impl From<Vec<Track>> for Queue {
    fn from(tracks: Vec<Track>) -> Self {
        Queue::new(tracks)
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tracks.iter().map(|t| t.key().to_string()))
            .finish()
    }
}

/// Index after `index`, honouring `repeat`. `None` means stop.
pub fn step_forward(index: usize, len: usize, repeat: RepeatMode) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match repeat {
        RepeatMode::One => Some(index.min(len - 1)),
        _ if index + 1 < len => Some(index + 1),
        RepeatMode::All => Some(0),
        RepeatMode::Off => None,
    }
}

/// Index before `index`. At the head with repeat off the first track is
/// restarted rather than wrapping.
pub fn step_back(index: usize, len: usize, repeat: RepeatMode) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match repeat {
        RepeatMode::One => Some(index.min(len - 1)),
        _ if index > 0 => Some((index - 1).min(len - 1)),
        RepeatMode::All => Some(len - 1),
        RepeatMode::Off => Some(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::SourceKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn queue(n: usize) -> Queue {
        (0..n)
            .map(|i| Track::new(i.to_string(), format!("Track {i}"), SourceKind::VideoHost))
            .collect::<Vec<_>>()
            .into()
    }

    fn ids(queue: &Queue) -> Vec<String> {
        queue.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_step_forward() {
        assert_eq!(step_forward(0, 3, RepeatMode::Off), Some(1));
        assert_eq!(step_forward(2, 3, RepeatMode::Off), None);
        assert_eq!(step_forward(2, 3, RepeatMode::All), Some(0));
        assert_eq!(step_forward(1, 3, RepeatMode::One), Some(1));
        assert_eq!(step_forward(0, 0, RepeatMode::All), None);
    }

    #[test]
    fn test_step_back() {
        assert_eq!(step_back(2, 3, RepeatMode::Off), Some(1));
        assert_eq!(step_back(0, 3, RepeatMode::Off), Some(0));
        assert_eq!(step_back(0, 3, RepeatMode::All), Some(2));
        assert_eq!(step_back(1, 3, RepeatMode::One), Some(1));
        assert_eq!(step_back(0, 0, RepeatMode::Off), None);
    }

    #[test]
    fn test_shuffle_pins_current_and_keeps_tracks() {
        let original = queue(20);
        let mut rng = StdRng::seed_from_u64(7);

        for pinned in [0, 5, 19] {
            let shuffled = original.shuffled(Some(pinned), &mut rng);
            assert_eq!(shuffled.len(), original.len());
            assert!(shuffled.get(0).unwrap().same_as(original.get(pinned).unwrap()));

            let mut a = ids(&original);
            let mut b = ids(&shuffled);
            a.sort();
            b.sort();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_shuffle_is_copy_on_write() {
        let original = queue(5);
        let snapshot = original.clone();
        let shuffled = original.shuffled(Some(2), &mut StdRng::seed_from_u64(1));

        assert!(original.ptr_eq(&snapshot));
        assert!(!shuffled.ptr_eq(&original));
        assert_eq!(ids(&original), vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_position_of_uses_identity() {
        let q = queue(3);
        let renamed = Track::new("2", "renamed", SourceKind::VideoHost);
        assert_eq!(q.position_of(&renamed), Some(2));
        assert_eq!(
            q.position_of(&Track::new("2", "x", SourceKind::AudioHost)),
            None
        );
    }

    #[test]
    fn test_repeat_mode_strings() {
        for mode in [RepeatMode::Off, RepeatMode::One, RepeatMode::All] {
            assert_eq!(mode.as_str().parse::<RepeatMode>().unwrap(), mode);
        }
        assert_eq!(RepeatMode::Off.cycle().cycle().cycle(), RepeatMode::Off);
        assert_eq!(serde_json::to_string(&RepeatMode::All).unwrap(), "\"all\"");
    }
}
