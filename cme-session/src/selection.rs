use cme_census::feature::FeatureId;
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click carried no feature id; selection unchanged.
    Ignored,
    Selected(FeatureId),
}

/// Holds at most one selected feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTracker {
    current: Option<FeatureId>,
}

impl SelectionTracker {
    pub fn current(&self) -> Option<&FeatureId> {
        self.current.as_ref()
    }

    /// A click with an id replaces the selection unconditionally, even when
    /// it names the feature already selected.
    pub fn on_feature_click(&mut self, click: Option<FeatureId>) -> ClickOutcome {
        match click {
            Some(id) => {
                self.current = Some(id.clone());
                ClickOutcome::Selected(id)
            }
            None => {
                debug!("Ignoring click without feature id");
                ClickOutcome::Ignored
            }
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_with_id_selects_and_overwrites() {
        let mut tracker = SelectionTracker::default();
        assert_eq!(
            tracker.on_feature_click(Some(FeatureId::from("10003014500"))),
            ClickOutcome::Selected(FeatureId::from("10003014500"))
        );
        tracker.on_feature_click(Some(FeatureId::from("10003014600")));
        assert_eq!(tracker.current(), Some(&FeatureId::from("10003014600")));
    }

    #[test]
    fn empty_click_leaves_selection() {
        let mut tracker = SelectionTracker::default();
        tracker.on_feature_click(Some(FeatureId::from("10003014500")));
        assert_eq!(tracker.on_feature_click(None), ClickOutcome::Ignored);
        assert_eq!(tracker.current(), Some(&FeatureId::from("10003014500")));
        tracker.clear();
        assert_eq!(tracker.current(), None);
    }
}
