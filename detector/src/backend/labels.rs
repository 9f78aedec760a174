use std::collections::HashMap;

use crate::error::ScoringError;
use crate::prediction::Distribution;

/// Which output index holds which class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelMap {
    pub fake: usize,
    pub real: usize,
}

impl LabelMap {
    /// Convention for pretrained deepfake classifiers without usable labels
    pub const FAKE_FIRST: LabelMap = LabelMap { fake: 0, real: 1 };
    /// Fallback for custom checkpoints that carry no class list
    pub const REAL_FIRST: LabelMap = LabelMap { fake: 1, real: 0 };

    /// Resolve indices from a Hugging Face style `id2label` table.
    ///
    /// Returns `None` unless exactly one label reads as fake and exactly one
    /// as real.
    pub fn from_id2label(id2label: &HashMap<String, String>) -> Option<Self> {
        Self::from_indexed(id2label.iter().filter_map(|(id, label)| {
            id.trim().parse::<usize>().ok().map(|index| (index, label.as_str()))
        }))
    }

    /// Resolve indices from an ordered class list, as stored next to the
    /// weights by the training script (`['fake', 'real']` for folders
    /// sorted alphabetically).
    pub fn from_class_names<S: AsRef<str>>(classes: &[S]) -> Option<Self> {
        Self::from_indexed(classes.iter().map(AsRef::as_ref).enumerate())
    }

    fn from_indexed<'a>(labels: impl Iterator<Item = (usize, &'a str)>) -> Option<Self> {
        let mut fake = None;
        let mut real = None;

        for (index, label) in labels {
            match classify_label(label) {
                Some(LabelClass::Fake) => {
                    if fake.replace(index).is_some() {
                        return None;
                    }
                }
                Some(LabelClass::Real) => {
                    if real.replace(index).is_some() {
                        return None;
                    }
                }
                None => {}
            }
        }

        match (fake, real) {
            (Some(fake), Some(real)) if fake != real => Some(Self { fake, real }),
            _ => None,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.fake.max(self.real) + 1
    }

    /// Pick the real/fake pair out of a softmax row.
    pub fn distribution(&self, probs: &[f32]) -> Result<Distribution, ScoringError> {
        let needed = self.fake.max(self.real);
        match (probs.get(self.real), probs.get(self.fake)) {
            (Some(&real), Some(&fake)) => Ok(Distribution::new(real, fake)),
            _ => Err(ScoringError::OutputShape {
                got: probs.len(),
                needed,
            }),
        }
    }
}

enum LabelClass {
    Fake,
    Real,
}

fn classify_label(label: &str) -> Option<LabelClass> {
    let label = label.to_ascii_lowercase();
    let fake = ["fake", "synthetic", "generated"]
        .iter()
        .any(|w| label.contains(w));
    let real = ["real", "authentic", "genuine"]
        .iter()
        .any(|w| label.contains(w));

    match (fake, real) {
        (true, false) => Some(LabelClass::Fake),
        (false, true) => Some(LabelClass::Real),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reads_reversed_labels() {
        // Deep-Fake-Detector-v2 ships {0: Realism, 1: Deepfake}
        let map = LabelMap::from_id2label(&table(&[("0", "Realism"), ("1", "Deepfake")]));
        assert_eq!(map, Some(LabelMap { fake: 1, real: 0 }));
    }

    #[test]
    fn reads_conventional_labels() {
        let map = LabelMap::from_id2label(&table(&[("0", "FAKE"), ("1", "REAL")]));
        assert_eq!(map, Some(LabelMap::FAKE_FIRST));
    }

    #[test]
    fn generic_labels_are_not_trusted() {
        assert_eq!(
            LabelMap::from_id2label(&table(&[("0", "LABEL_0"), ("1", "LABEL_1")])),
            None
        );
        assert_eq!(
            LabelMap::from_id2label(&table(&[("0", "fake"), ("1", "deepfake")])),
            None
        );
    }

    #[test]
    fn class_list_order_decides_indices() {
        assert_eq!(
            LabelMap::from_class_names(&["fake", "real"]),
            Some(LabelMap::FAKE_FIRST)
        );
        assert_eq!(
            LabelMap::from_class_names(&["real".to_string(), "fake".to_string()]),
            Some(LabelMap::REAL_FIRST)
        );
        assert_eq!(LabelMap::from_class_names(&["cat", "dog"]), None);
        assert_eq!(LabelMap::from_class_names::<&str>(&[]), None);
    }

    #[test]
    fn distribution_picks_indices() {
        let dist = LabelMap::REAL_FIRST.distribution(&[0.8, 0.2]).unwrap();
        assert_eq!(dist, Distribution::new(0.8, 0.2));

        let dist = LabelMap::FAKE_FIRST.distribution(&[0.8, 0.2]).unwrap();
        assert_eq!(dist, Distribution::new(0.2, 0.8));
    }

    #[test]
    fn short_output_is_an_error() {
        let err = LabelMap { fake: 0, real: 2 }.distribution(&[0.4, 0.6]).unwrap_err();
        assert!(matches!(err, ScoringError::OutputShape { got: 2, needed: 2 }));
    }
}
