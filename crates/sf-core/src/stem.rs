use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One isolated musical component of a mix.
///
/// Discriminants follow the output bus order of the separator:
/// vocals, drums, bass, other, then guitar and piano for the six-stem layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stem {
    Vocals,
    Drums,
    Bass,
    Other,
    Guitar,
    Piano,
}

impl Stem {
    /// Every stem, in bus order.
    pub const ALL: [Stem; 6] = [
        Stem::Vocals,
        Stem::Drums,
        Stem::Bass,
        Stem::Other,
        Stem::Guitar,
        Stem::Piano,
    ];

    /// Lowercase name, used for file naming and CLI parsing.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Stem::Vocals => "vocals",
            Stem::Drums => "drums",
            Stem::Bass => "bass",
            Stem::Other => "other",
            Stem::Guitar => "guitar",
            Stem::Piano => "piano",
        }
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stem {
    type Err = CoreError;

    /// # Example
    /// ```
    /// use sf_core::Stem;
    /// assert_eq!("Drums".parse::<Stem>().ok(), Some(Stem::Drums));
    /// assert!("kazoo".parse::<Stem>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Stem::ALL
            .into_iter()
            .find(|stem| stem.name() == lower)
            .ok_or(CoreError::UnknownStem {
                name: s.to_string(),
            })
    }
}

/// Which set of stems the separator produces.
///
/// # Example
/// ```
/// use sf_core::stem::{Stem, StemLayout};
/// assert_eq!(StemLayout::Four.len(), 4);
/// assert_eq!(StemLayout::Six.index_of(Stem::Piano), Some(5));
/// assert_eq!(StemLayout::Four.index_of(Stem::Guitar), None);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StemLayout {
    /// Vocals, drums, bass, other.
    #[default]
    Four,
    /// Four-stem set plus guitar and piano.
    Six,
}

impl StemLayout {
    /// Stems of this layout, in bus order.
    #[must_use]
    pub fn stems(self) -> &'static [Stem] {
        match self {
            StemLayout::Four => &Stem::ALL[..4],
            StemLayout::Six => &Stem::ALL,
        }
    }

    /// Number of stems.
    #[must_use]
    pub fn len(self) -> usize {
        self.stems().len()
    }

    /// Always `false`; a layout has at least four stems.
    #[must_use]
    pub fn is_empty(self) -> bool {
        false
    }

    /// Bus index of `stem`, or `None` if the layout does not carry it.
    #[must_use]
    pub fn index_of(self, stem: Stem) -> Option<usize> {
        self.stems().iter().position(|&s| s == stem)
    }

    /// Layout name for logs and error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            StemLayout::Four => "four",
            StemLayout::Six => "six",
        }
    }
}

impl FromStr for StemLayout {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "four" | "4" => Ok(StemLayout::Four),
            "six" | "6" => Ok(StemLayout::Six),
            other => Err(CoreError::Config(format!("layout inconnu '{other}'"))),
        }
    }
}

/// Stereo output buffers, one pair per stem, sized to the current block.
///
/// Storage is allocated once for `capacity` frames; `begin_block` only moves
/// the visible length and zeroes it. Slices returned by the accessors stay
/// valid until the next mutable call on the set.
///
/// # Example
/// ```
/// use sf_core::stem::{Stem, StemLayout, StemSet};
/// let mut set = StemSet::new(StemLayout::Four, 512);
/// set.begin_block(128);
/// assert_eq!(set.len(), 128);
/// assert_eq!(set.channel(0, 1).len(), 128);
/// assert!(set.stem(Stem::Bass).is_some());
/// ```
#[derive(Clone, Debug)]
pub struct StemSet {
    layout: StemLayout,
    /// `buffers[stem][channel]`, each `capacity` long.
    buffers: Vec<[Vec<f32>; 2]>,
    capacity: usize,
    len: usize,
}

impl StemSet {
    /// Allocate a set for `layout` holding up to `capacity` frames per block.
    #[must_use]
    pub fn new(layout: StemLayout, capacity: usize) -> Self {
        let buffers = (0..layout.len())
            .map(|_| [vec![0.0; capacity], vec![0.0; capacity]])
            .collect();
        Self {
            layout,
            buffers,
            capacity,
            len: 0,
        }
    }

    /// Layout of this set.
    #[must_use]
    pub fn layout(&self) -> StemLayout {
        self.layout
    }

    /// Number of frames in the current block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the current block holds no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Frames that fit without reallocating.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stems.
    #[must_use]
    pub fn stem_count(&self) -> usize {
        self.buffers.len()
    }

    /// Start a new block of `frames` frames, zeroed.
    ///
    /// Returns `true` if storage had to grow (the host exceeded the block
    /// size it announced in `prepare`). That is the only allocation.
    pub fn begin_block(&mut self, frames: usize) -> bool {
        let grew = frames > self.capacity;
        if grew {
            for pair in &mut self.buffers {
                for ch in pair.iter_mut() {
                    ch.resize(frames, 0.0);
                }
            }
            self.capacity = frames;
        }
        self.len = frames;
        for pair in &mut self.buffers {
            for ch in pair.iter_mut() {
                ch[..frames].fill(0.0);
            }
        }
        grew
    }

    /// Zero the whole storage and drop the visible length to 0.
    pub fn clear(&mut self) {
        for pair in &mut self.buffers {
            for ch in pair.iter_mut() {
                ch.fill(0.0);
            }
        }
        self.len = 0;
    }

    /// Channel `ch` (0 = left, 1 = right) of the stem at bus `index`.
    ///
    /// # Panics
    /// Panics if `index >= stem_count()` or `ch > 1`.
    #[must_use]
    pub fn channel(&self, index: usize, ch: usize) -> &[f32] {
        &self.buffers[index][ch][..self.len]
    }

    /// Mutable channel `ch` of the stem at bus `index`.
    ///
    /// # Panics
    /// Panics if `index >= stem_count()` or `ch > 1`.
    pub fn channel_mut(&mut self, index: usize, ch: usize) -> &mut [f32] {
        let len = self.len;
        &mut self.buffers[index][ch][..len]
    }

    /// Left/right pair of `stem`, or `None` if the layout lacks it.
    #[must_use]
    pub fn stem(&self, stem: Stem) -> Option<(&[f32], &[f32])> {
        let idx = self.layout.index_of(stem)?;
        Some((self.channel(idx, 0), self.channel(idx, 1)))
    }

    /// Iterate `(stem, left, right)` in bus order.
    pub fn iter(&self) -> impl Iterator<Item = (Stem, &[f32], &[f32])> {
        self.layout
            .stems()
            .iter()
            .enumerate()
            .map(|(i, &stem)| (stem, self.channel(i, 0), self.channel(i, 1)))
    }
}
