use im::Vector;
use crate::events::sample::PriceSample;
use crate::types::timestamp::Timestamp;

/// Immutable view of a route's samples, oldest first.
///
/// Cloning is cheap and the view never changes after it is handed out, so it
/// can be iterated any number of times while appends continue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct History {
    samples: Vector<PriceSample>,
    start: usize,
}

impl History {
    pub fn new(samples: Vector<PriceSample>) -> Self {
        History { samples, start: 0 }
    }

    /// Restrict the view to samples observed at or after `since`.
    pub fn since(mut self, since: Timestamp) -> Self {
        let idx = match self.samples.binary_search_by(|s| s.observed_at.cmp(&since)) {
            Ok(i) | Err(i) => i,
        };
        self.start = self.start.max(idx);
        self
    }

    pub fn iter(&self) -> std::iter::Skip<im::vector::Iter<'_, PriceSample>> {
        self.samples.iter().skip(self.start)
    }

    pub fn len(&self) -> usize {
        self.samples.len().saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<&PriceSample> {
        if self.is_empty() {
            return None;
        }
        self.samples.last()
    }

    /// The newest sample and the view that precedes it.
    pub fn split_last(&self) -> Option<(PriceSample, History)> {
        let last = self.last()?.clone();
        let mut samples = self.samples.clone();
        samples.pop_back();
        Some((last, History { samples, start: self.start }))
    }

    pub fn to_vec(&self) -> Vec<PriceSample> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a PriceSample;
    type IntoIter = std::iter::Skip<im::vector::Iter<'a, PriceSample>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<PriceSample> for History {
    fn from_iter<I: IntoIterator<Item = PriceSample>>(iter: I) -> Self {
        History::new(iter.into_iter().collect())
    }
}
