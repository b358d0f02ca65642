//! Ordered backend registries with round-robin rotation.
//!
//! A [`Registry`] owns a static, ordered list of interchangeable backends and one
//! [`RotationState`]. Writes pick backends through [`Registry::next`]; fallback and lookup
//! walk the static order through [`Registry::iter`] and [`Registry::fallback_order`].
//!
//! Rotation is exact within one process. Separate processes keep separate cursors, so a
//! multi-instance deployment only approximates an even spread.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Pure rotation step: returns `(selected, next_cursor)` for a list of `len` entries.
///
/// An empty list selects position 0 and leaves the cursor at 0.
pub fn next_position(cursor: usize, len: usize) -> (usize, usize) {
    if len == 0 {
        return (0, 0);
    }
    let selected = cursor % len;
    (selected, (selected + 1) % len)
}

/// Round-robin cursor. Starts at 0 and is not persisted across restarts.
#[derive(Debug, Default)]
pub struct RotationState {
    cursor: AtomicUsize,
}

impl RotationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(position: usize) -> Self {
        Self {
            cursor: AtomicUsize::new(position),
        }
    }

    /// Position the next call to [`advance`](Self::advance) will select (before wrapping).
    pub fn current(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Select a position in `0..len` and move the cursor one step forward.
    ///
    /// Read and increment happen in a single atomic update, so concurrent callers never
    /// receive the same position within one rotation.
    pub fn advance(&self, len: usize) -> usize {
        let previous = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                Some(next_position(cursor, len).1)
            }) {
            Ok(previous) | Err(previous) => previous,
        };
        next_position(previous, len).0
    }
}

/// Static ordered list of backends plus the rotation cursor used to pick among them.
#[derive(Debug)]
pub struct Registry<T> {
    entries: Vec<T>,
    rotation: RotationState,
}

impl<T> Registry<T> {
    pub fn new(entries: Vec<T>) -> Self {
        Self::with_rotation(entries, RotationState::new())
    }

    pub fn with_rotation(entries: Vec<T>, rotation: RotationState) -> Self {
        Self { entries, rotation }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rotation(&self) -> &RotationState {
        &self.rotation
    }

    /// Next entry in round-robin order, with its registry position.
    pub fn next(&self) -> Option<(usize, &T)> {
        if self.entries.is_empty() {
            return None;
        }
        let position = self.rotation.advance(self.entries.len());
        self.entries.get(position).map(|entry| (position, entry))
    }

    /// Entries in static registry order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Entries in static registry order, skipping the position already tried.
    pub fn fallback_order(&self, tried: usize) -> impl Iterator<Item = (usize, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(position, _)| *position != tried)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_next_position_wraps() {
        assert_eq!(next_position(0, 3), (0, 1));
        assert_eq!(next_position(2, 3), (2, 0));
        assert_eq!(next_position(7, 3), (1, 2));
        assert_eq!(next_position(5, 0), (0, 0));
    }

    #[test]
    fn test_round_robin_visits_every_entry_once_per_cycle() {
        let registry = Registry::new(vec!["a", "b", "c"]);
        for _ in 0..4 {
            let mut cycle: Vec<&str> = (0..registry.len())
                .map(|_| *registry.next().unwrap().1)
                .collect();
            cycle.sort();
            assert_eq!(cycle, vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn test_round_robin_starts_from_cursor_in_registry_order() {
        let registry = Registry::with_rotation(vec!["a", "b", "c"], RotationState::starting_at(1));
        let picked: Vec<&str> = (0..3).map(|_| *registry.next().unwrap().1).collect();
        assert_eq!(picked, vec!["b", "c", "a"]);
        assert_eq!(registry.rotation().current(), 1);
    }

    #[test]
    fn test_empty_registry_selects_nothing() {
        let registry: Registry<&str> = Registry::new(Vec::new());
        assert!(registry.next().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_fallback_order_skips_tried_position() {
        let registry = Registry::new(vec!["a", "b", "c"]);
        let order: Vec<&str> = registry.fallback_order(1).map(|(_, e)| *e).collect();
        assert_eq!(order, vec!["a", "c"]);
    }

    #[test]
    fn test_rotation_is_exact_under_concurrency() {
        let registry = Arc::new(Registry::new(vec![0usize, 1, 2]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..300)
                        .map(|_| *registry.next().unwrap().1)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for handle in handles {
            for entry in handle.join().unwrap() {
                *counts.entry(entry).or_default() += 1;
            }
        }
        assert_eq!(counts.values().copied().collect::<Vec<_>>(), vec![800; 3]);
    }
}
