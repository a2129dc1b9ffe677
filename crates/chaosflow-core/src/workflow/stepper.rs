//! Wizard step navigation.
//!
//! A [`Stepper`] tracks the current index within a bounded sequence of
//! steps. Moves are synchronous and never leave `[0, count)`; an optional
//! callback observes every change of index.

use std::fmt;

use chaosflow_types::workflow::NodeId;

use super::tree::{self, NodeMap};

/// A change of the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepChange {
    pub from: usize,
    pub to: usize,
}

type OnChange = Box<dyn FnMut(StepChange) + Send>;

/// Current-step state machine.
pub struct Stepper {
    current: usize,
    count: usize,
    on_change: Option<OnChange>,
}

impl Stepper {
    /// A stepper over `count` steps (at least one), starting at step 0.
    pub fn new(count: usize) -> Self {
        Self {
            current: 0,
            count: count.max(1),
            on_change: None,
        }
    }

    pub fn with_callback(mut self, on_change: impl FnMut(StepChange) + Send + 'static) -> Self {
        self.on_change = Some(Box::new(on_change));
        self
    }

    pub fn set_on_change(&mut self, on_change: impl FnMut(StepChange) + Send + 'static) {
        self.on_change = Some(Box::new(on_change));
    }

    pub fn clear_on_change(&mut self) {
        self.on_change = None;
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 == self.count
    }

    /// Jump to `index`. Out of range is a no-op returning `false`.
    pub fn set_current(&mut self, index: usize) -> bool {
        let Some(change) = self.move_to(index) else {
            return index < self.count;
        };
        if let Some(on_change) = self.on_change.as_mut() {
            on_change(change);
        }
        true
    }

    /// Jump to `index`, notifying `on_change` instead of the stored callback.
    pub fn set_current_with(&mut self, index: usize, on_change: impl FnOnce(StepChange)) -> bool {
        let Some(change) = self.move_to(index) else {
            return index < self.count;
        };
        on_change(change);
        true
    }

    /// Advance one step; stays put on the last step.
    pub fn next(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.set_current(self.current + 1)
    }

    /// Go back one step; stays put on the first step.
    pub fn back(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.set_current(self.current - 1)
    }

    /// Resize to `count` steps (at least one), clamping the current step.
    pub fn set_count(&mut self, count: usize) {
        self.count = count.max(1);
        if self.current >= self.count {
            self.set_current(self.count - 1);
        }
    }

    /// Apply a move within range, returning the change if the index moved.
    fn move_to(&mut self, index: usize) -> Option<StepChange> {
        if index >= self.count || index == self.current {
            return None;
        }
        let change = StepChange {
            from: self.current,
            to: index,
        };
        self.current = index;
        tracing::debug!(from = change.from, to = change.to, "step changed");
        Some(change)
    }
}

impl Default for Stepper {
    fn default() -> Self {
        Self::new(1)
    }
}

impl fmt::Debug for Stepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stepper")
            .field("current", &self.current)
            .field("count", &self.count)
            .field("has_callback", &self.on_change.is_some())
            .finish()
    }
}

/// The order in which a wizard walks the tree: pre-order from `root` over
/// children, then branch targets. Each node appears once, even when shared or
/// cyclic.
pub fn step_sequence(nodes: &NodeMap, root: &NodeId) -> Vec<NodeId> {
    tree::preorder(nodes, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::tree::tests::{map_of, parallel, serial, single};
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<StepChange>>>, impl FnMut(StepChange) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |change| sink.lock().unwrap().push(change))
    }

    #[test]
    fn test_new_clamps_count() {
        let stepper = Stepper::new(0);
        assert_eq!(stepper.count(), 1);
        assert!(stepper.is_first());
        assert!(stepper.is_last());
    }

    #[test]
    fn test_set_current_bounds() {
        let mut stepper = Stepper::new(3);
        assert!(stepper.set_current(2));
        assert_eq!(stepper.current(), 2);
        assert!(!stepper.set_current(3));
        assert_eq!(stepper.current(), 2);
        assert!(stepper.set_current(2), "same index is in range");
    }

    #[test]
    fn test_next_and_back_never_leave_range() {
        let mut stepper = Stepper::new(2);
        assert!(!stepper.back());
        assert!(stepper.next());
        assert!(!stepper.next());
        assert_eq!(stepper.current(), 1);
        assert!(stepper.back());
        assert_eq!(stepper.current(), 0);
    }

    #[test]
    fn test_callback_fires_only_on_change() {
        let (seen, on_change) = recorder();
        let mut stepper = Stepper::new(4).with_callback(on_change);

        stepper.next();
        stepper.set_current(1);
        stepper.set_current(9);
        stepper.set_current(3);
        stepper.next();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![StepChange { from: 0, to: 1 }, StepChange { from: 1, to: 3 }]
        );
    }

    #[test]
    fn test_clear_callback() {
        let (seen, on_change) = recorder();
        let mut stepper = Stepper::new(3);
        stepper.set_on_change(on_change);
        stepper.next();
        stepper.clear_on_change();
        stepper.next();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_set_current_with_per_call_callback() {
        let mut stepper = Stepper::new(3);
        let mut fired = None;
        assert!(stepper.set_current_with(2, |change| fired = Some(change)));
        assert_eq!(fired, Some(StepChange { from: 0, to: 2 }));

        let mut called = false;
        assert!(!stepper.set_current_with(5, |_| called = true));
        assert!(!called);
    }

    #[test]
    fn test_set_count_clamps_current() {
        let (seen, on_change) = recorder();
        let mut stepper = Stepper::new(5).with_callback(on_change);
        stepper.set_current(4);
        stepper.set_count(2);
        assert_eq!(stepper.count(), 2);
        assert_eq!(stepper.current(), 1);
        assert_eq!(seen.lock().unwrap().last(), Some(&StepChange { from: 4, to: 1 }));

        stepper.set_count(0);
        assert_eq!(stepper.count(), 1);
        assert_eq!(stepper.current(), 0);
    }

    #[test]
    fn test_step_sequence_is_preorder() {
        let nodes = map_of(vec![
            serial("r", &["p", "z"]),
            parallel("p", &["b", "a"]),
            single("a"),
            single("b"),
            single("z"),
        ]);
        let order: Vec<String> = step_sequence(&nodes, &NodeId::from("r"))
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(order, vec!["r", "p", "b", "a", "z"]);
    }

    #[test]
    fn test_step_sequence_terminates_on_cycle() {
        let nodes = map_of(vec![serial("r", &["a"]), serial("a", &["r"])]);
        assert_eq!(step_sequence(&nodes, &NodeId::from("r")).len(), 2);
    }
}
