//! Move reconciliation: recovering moves lost between notifications.
//!
//! # Why is this needed? (for beginners)
//!
//! BLE notifications are not guaranteed to arrive.  A fast solver can turn
//! several faces in the time it takes one notification to go out, and some of
//! those notifications are simply dropped by the radio.  To cope with this,
//! every move frame carries not only the latest move but also a short
//! *history* of the moves before it, each tagged with a **marker**:
//!
//! - QiYi devices tag moves with a 32-bit millisecond timestamp.
//! - MoYu32 devices tag moves with an 8-bit counter that wraps from 255 to 0.
//!
//! The reconciler remembers the newest marker it has already forwarded.  When
//! a new frame arrives it walks the history from newest to oldest, collects
//! every entry that is newer than that remembered marker, and replays the
//! collected moves in chronological order.  Moves seen in an earlier frame are
//! never forwarded twice; moves whose own notification was lost are recovered
//! from the next frame's history.
//!
//! # Gap cap
//!
//! If more moves were lost than the history window can hold, the missing ones
//! cannot be recovered.  The reconciler forwards what the window has and
//! reports the gap through [`Reconciliation::history_exhausted`]; it never
//! invents moves.

use std::fmt::Debug;

use tracing::{debug, warn};

use crate::domain::moves::{Move, MoveEvent};

/// A device-local ordering value attached to each reported move.
pub trait Marker: Copy + Eq + Debug {
    /// Returns `true` if `self` is strictly newer than `last`, given that
    /// `newest` is the newest marker in the current frame.
    fn is_newer(self, last: Self, newest: Self) -> bool;

    /// The marker widened for [`MoveEvent::marker`].
    fn as_u32(self) -> u32;
}

/// A monotonic 32-bit timestamp (QiYi).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u32);

impl Marker for Timestamp {
    fn is_newer(self, last: Self, _newest: Self) -> bool {
        self.0 > last.0
    }

    fn as_u32(self) -> u32 {
        self.0
    }
}

/// An 8-bit counter that wraps from 255 to 0 (MoYu32).
///
/// Plain comparison does not work across the wrap, so "newer" is measured
/// relative to the newest counter in the frame: an entry is newer than `last`
/// when it is fewer steps behind `newest` than `last` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WrappingCounter(pub u8);

impl WrappingCounter {
    /// Number of increments from `earlier` to `self`, modulo 256.
    pub fn steps_since(self, earlier: WrappingCounter) -> u8 {
        self.0.wrapping_sub(earlier.0)
    }
}

impl Marker for WrappingCounter {
    fn is_newer(self, last: Self, newest: Self) -> bool {
        newest.steps_since(self) < newest.steps_since(last)
    }

    fn as_u32(self) -> u32 {
        u32::from(self.0)
    }
}

/// One reported move and its marker.
///
/// `mv` is `None` when the device reported a code outside the move table.
/// Such entries still take part in the marker walk but are never forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry<M> {
    pub mv: Option<Move>,
    pub code: u8,
    pub marker: M,
}

/// Outcome of one [`Reconciler::reconcile`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Moves to forward, oldest first.
    pub events: Vec<MoveEvent>,
    /// How many history entries were newer than the last forwarded marker.
    pub collected: usize,
    /// `true` if every entry in the window was new, so older moves may have
    /// fallen out of the window before they could be recovered.
    pub history_exhausted: bool,
}

/// Per-connection reconciliation state.
#[derive(Debug, Clone)]
pub struct Reconciler<M> {
    last: Option<M>,
    capacity: usize,
}

impl<M: Marker> Reconciler<M> {
    /// Creates a reconciler that looks at most `capacity` entries deep.
    pub fn new(capacity: usize) -> Self {
        Self {
            last: None,
            capacity,
        }
    }

    /// The newest marker forwarded or observed so far, if any.
    pub fn last_observed(&self) -> Option<M> {
        self.last
    }

    /// Sets the baseline marker without forwarding anything.
    ///
    /// Used when a device reports its current marker outside a move frame
    /// (QiYi hello, MoYu32 status).
    pub fn observe(&mut self, marker: M) {
        self.last = Some(marker);
    }

    /// Forgets the baseline, as at the start of a connection.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Works out which entries of `history` are new and returns their moves.
    ///
    /// `history` must be ordered newest first; `history[0]` is the move the
    /// frame was sent for.  When no baseline is known yet, only that newest
    /// entry is taken.
    pub fn reconcile(&mut self, history: &[HistoryEntry<M>]) -> Reconciliation {
        let Some(newest) = history.first() else {
            return Reconciliation::default();
        };

        let window = &history[..history.len().min(self.capacity)];
        let collected: &[HistoryEntry<M>] = match self.last {
            None => &window[..window.len().min(1)],
            Some(last) => {
                let fresh = window
                    .iter()
                    .take_while(|e| e.marker.is_newer(last, newest.marker))
                    .count();
                &window[..fresh]
            }
        };

        let history_exhausted = self.last.is_some() && collected.len() == window.len();
        if collected.len() > 1 {
            warn!(
                recovered = collected.len() - 1,
                exhausted = history_exhausted,
                "notifications lost; recovering moves from history"
            );
        }

        let events = collected
            .iter()
            .rev()
            .filter_map(|e| match e.mv {
                Some(mv) => Some(MoveEvent {
                    mv,
                    marker: e.marker.as_u32(),
                }),
                None => {
                    debug!(code = e.code, marker = ?e.marker, "skipping invalid move code");
                    None
                }
            })
            .collect();

        if !collected.is_empty() {
            self.last = Some(newest.marker);
        }

        Reconciliation {
            events,
            collected: collected.len(),
            history_exhausted,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::moves::{Face, Turn};

    const R: Move = Move::new(Face::R, Turn::Clockwise);
    const U: Move = Move::new(Face::U, Turn::Clockwise);
    const F: Move = Move::new(Face::F, Turn::CounterClockwise);

    fn ts(mv: Move, t: u32) -> HistoryEntry<Timestamp> {
        HistoryEntry {
            mv: Some(mv),
            code: 0,
            marker: Timestamp(t),
        }
    }

    fn ctr(mv: Option<Move>, c: u8) -> HistoryEntry<WrappingCounter> {
        HistoryEntry {
            mv,
            code: 0,
            marker: WrappingCounter(c),
        }
    }

    fn tokens(r: &Reconciliation) -> Vec<String> {
        r.events.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_unknown_baseline_takes_only_newest() {
        // Arrange
        let mut rec = Reconciler::new(10);
        let history = [ts(R, 300), ts(U, 200), ts(F, 100)];

        // Act
        let out = rec.reconcile(&history);

        // Assert
        assert_eq!(tokens(&out), ["R"]);
        assert_eq!(rec.last_observed(), Some(Timestamp(300)));
    }

    #[test]
    fn test_emits_new_moves_oldest_first() {
        // Arrange
        let mut rec = Reconciler::new(10);
        rec.observe(Timestamp(100));
        let history = [ts(R, 300), ts(U, 200), ts(F, 100)];

        // Act
        let out = rec.reconcile(&history);

        // Assert
        assert_eq!(tokens(&out), ["U", "R"]);
        assert_eq!(out.collected, 2);
        assert!(!out.history_exhausted);
        assert_eq!(rec.last_observed(), Some(Timestamp(300)));
    }

    #[test]
    fn test_repeated_frame_emits_nothing() {
        let mut rec = Reconciler::new(10);
        rec.observe(Timestamp(100));
        let history = [ts(R, 300), ts(U, 200), ts(F, 100)];

        rec.reconcile(&history);
        let again = rec.reconcile(&history);

        assert!(again.events.is_empty());
        assert_eq!(rec.last_observed(), Some(Timestamp(300)));
    }

    #[test]
    fn test_stale_frame_leaves_marker_untouched() {
        let mut rec = Reconciler::new(10);
        rec.observe(Timestamp(500));

        let out = rec.reconcile(&[ts(R, 400), ts(U, 300)]);

        assert!(out.events.is_empty());
        assert_eq!(rec.last_observed(), Some(Timestamp(500)));
    }

    #[test]
    fn test_gap_larger_than_window_is_capped() {
        // Arrange – baseline far behind, every entry is new
        let mut rec = Reconciler::new(3);
        rec.observe(Timestamp(1));
        let history = [ts(R, 50), ts(U, 40), ts(F, 30), ts(R, 20), ts(U, 10)];

        // Act
        let out = rec.reconcile(&history);

        // Assert – only `capacity` entries, reported as exhausted
        assert_eq!(tokens(&out), ["F'", "U", "R"]);
        assert!(out.history_exhausted);
    }

    #[test]
    fn test_wrapping_counter_across_255() {
        // Arrange
        let mut rec = Reconciler::new(5);
        rec.observe(WrappingCounter(254));
        let history = [
            ctr(Some(R), 1),
            ctr(Some(U), 0),
            ctr(Some(F), 255),
            ctr(Some(R), 254),
            ctr(Some(U), 253),
        ];

        // Act
        let out = rec.reconcile(&history);

        // Assert
        assert_eq!(tokens(&out), ["F'", "U", "R"]);
        assert_eq!(rec.last_observed(), Some(WrappingCounter(1)));
    }

    #[test]
    fn test_wrapping_counter_full_window_is_capped() {
        // Counter jumped by 200 but only five slots exist.
        let mut rec = Reconciler::new(5);
        rec.observe(WrappingCounter(10));
        let history: Vec<_> = (0..5u8).map(|i| ctr(Some(R), 210 - i)).collect();

        let out = rec.reconcile(&history);

        assert_eq!(out.events.len(), 5);
        assert!(out.history_exhausted);
        assert_eq!(rec.last_observed(), Some(WrappingCounter(210)));
    }

    #[test]
    fn test_invalid_entries_walked_but_never_forwarded() {
        let mut rec = Reconciler::new(5);
        rec.observe(WrappingCounter(7));
        let history = [ctr(Some(R), 10), ctr(None, 9), ctr(Some(U), 8), ctr(Some(F), 7)];

        let out = rec.reconcile(&history);

        assert_eq!(tokens(&out), ["U", "R"]);
        assert_eq!(out.collected, 3);
    }

    #[test]
    fn test_empty_history_is_a_no_op() {
        let mut rec: Reconciler<Timestamp> = Reconciler::new(10);
        rec.observe(Timestamp(5));

        let out = rec.reconcile(&[]);

        assert_eq!(out, Reconciliation::default());
        assert_eq!(rec.last_observed(), Some(Timestamp(5)));
    }

    #[test]
    fn test_reset_forgets_baseline() {
        let mut rec = Reconciler::new(10);
        rec.observe(Timestamp(5));
        rec.reset();
        assert_eq!(rec.last_observed(), None);
    }

    #[test]
    fn test_wrapping_counter_is_newer() {
        let newest = WrappingCounter(3);
        assert!(WrappingCounter(2).is_newer(WrappingCounter(250), newest));
        assert!(!WrappingCounter(250).is_newer(WrappingCounter(250), newest));
        assert!(!WrappingCounter(3).is_newer(WrappingCounter(3), newest));
    }
}
