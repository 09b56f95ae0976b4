use std::collections::BTreeMap;

use crate::types::IndicatorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Armed { generation: u64 },
    Fired,
}

/// Timers to start and stop after reconciling rendered indicators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchPlan {
    /// Newly seen indicators with the generation their deadline must carry.
    pub arm: Vec<(IndicatorId, u64)>,
    /// Indicators that disappeared; any deadline for them must be cancelled.
    pub disarm: Vec<IndicatorId>,
}

impl WatchPlan {
    pub fn is_empty(&self) -> bool {
        self.arm.is_empty() && self.disarm.is_empty()
    }
}

/// Bookkeeping for stuck-loading deadlines, one per rendered indicator.
///
/// A watch fires at most once per indicator lifetime: after firing it stays
/// in the registry as `Fired` until the indicator disappears, or until
/// [`LoadingWatch::release_fired`] hands it back for re-arming.
#[derive(Debug, Clone, Default)]
pub struct LoadingWatch {
    watches: BTreeMap<IndicatorId, WatchState>,
    next_generation: u64,
}

impl LoadingWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff the currently rendered indicators against the watched set.
    pub fn reconcile(&mut self, present: &[IndicatorId]) -> WatchPlan {
        let mut plan = WatchPlan::default();

        let gone: Vec<IndicatorId> = self
            .watches
            .keys()
            .filter(|id| !present.contains(id))
            .cloned()
            .collect();
        for id in gone {
            if let Some(WatchState::Armed { .. }) = self.watches.remove(&id) {
                plan.disarm.push(id);
            }
        }

        for id in present {
            if self.watches.contains_key(id) {
                continue;
            }
            self.next_generation = self.next_generation.wrapping_add(1);
            let generation = self.next_generation;
            self.watches
                .insert(id.clone(), WatchState::Armed { generation });
            plan.arm.push((id.clone(), generation));
        }

        plan
    }

    /// Called when a deadline fires. Returns `true` if the watch was live.
    pub fn expire(&mut self, id: &IndicatorId, generation: u64) -> bool {
        match self.watches.get_mut(id) {
            Some(state) if *state == WatchState::Armed { generation } => {
                *state = WatchState::Fired;
                true
            }
            _ => false,
        }
    }

    /// Drop a watch without reporting it, e.g. when the indicator vanished
    /// between the deadline and the presence check.
    pub fn forget(&mut self, id: &IndicatorId) {
        self.watches.remove(id);
    }

    /// Drop fired watches so the next reconcile arms them with a fresh
    /// deadline. Needed when the reconnect they triggered was cancelled.
    pub fn release_fired(&mut self) -> Vec<IndicatorId> {
        let fired: Vec<IndicatorId> = self
            .watches
            .iter()
            .filter(|(_, state)| **state == WatchState::Fired)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &fired {
            self.watches.remove(id);
        }
        fired
    }

    /// Forget every watch and return the ones whose timers are still armed.
    pub fn clear(&mut self) -> Vec<IndicatorId> {
        let armed = self
            .watches
            .iter()
            .filter(|(_, state)| matches!(state, WatchState::Armed { .. }))
            .map(|(id, _)| id.clone())
            .collect();
        self.watches.clear();
        armed
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    pub fn any_fired(&self) -> bool {
        self.watches
            .values()
            .any(|state| *state == WatchState::Fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<IndicatorId> {
        values.iter().map(|value| IndicatorId::new(*value)).collect()
    }

    #[test]
    fn arms_each_new_indicator_once() {
        let mut watch = LoadingWatch::new();
        let plan = watch.reconcile(&ids(&["listings", "seller"]));
        assert_eq!(plan.arm.len(), 2);
        assert!(plan.disarm.is_empty());

        let again = watch.reconcile(&ids(&["listings", "seller"]));
        assert!(again.is_empty());
        assert_eq!(watch.len(), 2);
    }

    #[test]
    fn disarms_indicators_that_disappeared() {
        let mut watch = LoadingWatch::new();
        watch.reconcile(&ids(&["listings", "seller"]));

        let plan = watch.reconcile(&ids(&["seller"]));
        assert_eq!(plan.disarm, ids(&["listings"]));
        assert!(plan.arm.is_empty());
        assert_eq!(watch.len(), 1);

        watch.reconcile(&[]);
        assert!(watch.is_empty());
    }

    #[test]
    fn expire_fires_once_and_rejects_stale_generations() {
        let mut watch = LoadingWatch::new();
        let plan = watch.reconcile(&ids(&["listings"]));
        let (id, generation) = plan.arm[0].clone();

        assert!(!watch.expire(&id, generation + 1));
        assert!(watch.expire(&id, generation));
        assert!(!watch.expire(&id, generation));
        assert!(watch.any_fired());

        let plan = watch.reconcile(&ids(&["listings"]));
        assert!(plan.is_empty(), "fired indicator must not be re-armed");
    }

    #[test]
    fn fired_watch_is_dropped_silently_when_indicator_goes_away() {
        let mut watch = LoadingWatch::new();
        let plan = watch.reconcile(&ids(&["listings"]));
        let (id, generation) = plan.arm[0].clone();
        watch.expire(&id, generation);

        let plan = watch.reconcile(&[]);
        assert!(plan.disarm.is_empty());
        assert!(watch.is_empty());
        assert!(!watch.any_fired());
    }

    #[test]
    fn reappearing_indicator_gets_fresh_generation() {
        let mut watch = LoadingWatch::new();
        let first = watch.reconcile(&ids(&["listings"])).arm[0].1;
        watch.reconcile(&[]);
        let second = watch.reconcile(&ids(&["listings"])).arm[0].1;
        assert_ne!(first, second);
    }

    #[test]
    fn released_fired_watch_is_armed_again_with_new_generation() {
        let mut watch = LoadingWatch::new();
        let plan = watch.reconcile(&ids(&["listings", "seller"]));
        let (fired_id, generation) = plan.arm[0].clone();
        watch.expire(&fired_id, generation);

        assert_eq!(watch.release_fired(), ids(&["listings"]));
        assert!(!watch.any_fired());
        assert_eq!(watch.len(), 1);

        let plan = watch.reconcile(&ids(&["listings", "seller"]));
        assert!(plan.disarm.is_empty());
        assert_eq!(plan.arm.len(), 1);
        assert_eq!(plan.arm[0].0, fired_id);
        assert_ne!(plan.arm[0].1, generation);
        assert!(!watch.expire(&fired_id, generation));
    }

    #[test]
    fn clear_returns_only_armed_watches() {
        let mut watch = LoadingWatch::new();
        let plan = watch.reconcile(&ids(&["a", "b"]));
        let (fired_id, generation) = plan.arm[0].clone();
        watch.expire(&fired_id, generation);

        let armed = watch.clear();
        assert_eq!(armed, ids(&["b"]));
        assert!(watch.is_empty());
    }
}
