//! Last-seen bookkeeping for one heartbeat receiver.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::PeerDelta;


/// Last time each peer identity was heard, for one listening port.
///
/// Backed by a `BTreeMap`, so peers and lost sets come out sorted without relying
/// on iteration order of a hash map.
#[derive(Debug, Clone)]
pub struct LivenessTable {
    last_seen: BTreeMap<String, Instant>,
    timeout: Duration,
}

impl LivenessTable {
    /// Creates an empty table declaring peers lost when older than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_seen: BTreeMap::new(),
            timeout,
        }
    }

    /// Folds one receive cycle into the table.
    ///
    /// `heard` is the identity received this cycle, `None` if the cycle timed out.
    /// An empty identity counts as nothing heard.
    ///
    /// ## Returns
    /// - `Some(PeerDelta)` if a peer arrived or at least one peer timed out
    /// - `None` if the cycle only confirmed known peers
    pub fn observe(&mut self, heard: Option<&str>, now: Instant) -> Option<PeerDelta> {
        let mut new = None;

        if let Some(id) = heard.filter(|id| !id.is_empty()) {
            if self.last_seen.insert(id.to_string(), now).is_none() {
                new = Some(id.to_string());
            }
        }

        let timeout = self.timeout;
        let lost: Vec<String> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &lost {
            self.last_seen.remove(id);
        }

        if new.is_none() && lost.is_empty() {
            return None;
        }

        Some(PeerDelta {
            peers: self.peers(),
            new,
            lost,
        })
    }

    /// Sorted identities currently considered alive.
    pub fn peers(&self) -> Vec<String> {
        self.last_seen.keys().cloned().collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn ms(start: Instant, n: u64) -> Instant {
        start + Duration::from_millis(n)
    }

    #[test]
    fn first_sighting_is_an_arrival() {
        let start = Instant::now();
        let mut table = LivenessTable::new(TIMEOUT);

        let delta = table.observe(Some("sendIDiszero"), start).unwrap();
        assert_eq!(delta.new.as_deref(), Some("sendIDiszero"));
        assert_eq!(delta.peers, vec!["sendIDiszero"]);
        assert!(delta.lost.is_empty());
    }

    #[test]
    fn repeated_sightings_are_silent() {
        let start = Instant::now();
        let mut table = LivenessTable::new(TIMEOUT);
        table.observe(Some("a"), start);

        for t in (10..200).step_by(10) {
            assert_eq!(table.observe(Some("a"), ms(start, t)), None);
        }
        assert_eq!(table.peers(), vec!["a".to_string()]);
    }

    #[test]
    fn empty_payload_is_nothing_heard() {
        let mut table = LivenessTable::new(TIMEOUT);
        assert_eq!(table.observe(Some(""), Instant::now()), None);
        assert!(table.peers().is_empty());
    }

    #[test]
    fn silent_peer_is_lost_exactly_once() {
        let start = Instant::now();
        let mut table = LivenessTable::new(TIMEOUT);
        table.observe(Some("sendIDisone"), start);

        // Age equal to the timeout is still alive
        assert_eq!(table.observe(None, ms(start, 50)), None);

        let delta = table.observe(None, ms(start, 51)).unwrap();
        assert_eq!(delta.lost, vec!["sendIDisone"]);
        assert!(delta.peers.is_empty());
        assert_eq!(delta.new, None);

        assert_eq!(table.observe(None, ms(start, 100)), None);
        assert_eq!(table.observe(None, ms(start, 500)), None);
    }

    #[test]
    fn lost_peer_can_come_back() {
        let start = Instant::now();
        let mut table = LivenessTable::new(TIMEOUT);
        table.observe(Some("b"), start);
        table.observe(None, ms(start, 60)).unwrap();

        let delta = table.observe(Some("b"), ms(start, 70)).unwrap();
        assert_eq!(delta.new.as_deref(), Some("b"));
        assert_eq!(delta.peers, vec!["b"]);
    }

    #[test]
    fn output_is_sorted() {
        let start = Instant::now();
        let mut table = LivenessTable::new(TIMEOUT);
        for (i, id) in ["delta", "alpha", "charlie", "bravo"].iter().enumerate() {
            table.observe(Some(*id), ms(start, i as u64));
        }
        let delta = table.observe(Some("aardvark"), ms(start, 10)).unwrap();
        assert_eq!(delta.peers, vec!["aardvark", "alpha", "bravo", "charlie", "delta"]);

        // Everything but aardvark times out in the same cycle
        table.observe(Some("aardvark"), ms(start, 50));
        let delta = table.observe(None, ms(start, 60)).unwrap();
        assert_eq!(delta.lost, vec!["alpha", "bravo", "charlie", "delta"]);
        assert_eq!(delta.peers, vec!["aardvark"]);
    }

    #[test]
    fn arrival_and_loss_in_the_same_cycle() {
        let start = Instant::now();
        let mut table = LivenessTable::new(TIMEOUT);
        table.observe(Some("old"), start);

        let delta = table.observe(Some("fresh"), ms(start, 80)).unwrap();
        assert_eq!(delta.new.as_deref(), Some("fresh"));
        assert_eq!(delta.lost, vec!["old"]);
        assert_eq!(delta.peers, vec!["fresh"]);
    }

    #[test]
    fn tracked_set_is_the_trailing_window() {
        let start = Instant::now();
        let mut table = LivenessTable::new(TIMEOUT);
        let heard = [(0, "a"), (20, "b"), (40, "c"), (70, "b"), (95, "d")];
        for (t, id) in heard {
            table.observe(Some(id), ms(start, t));
        }
        // At t=95: a (95ms) and c (55ms) are older than 50ms, b (25ms) and d (0ms) are not
        assert_eq!(table.peers(), vec!["b", "d"]);
    }

    #[test]
    fn same_input_gives_same_output() {
        let start = Instant::now();
        let script: Vec<(u64, Option<&str>)> = vec![
            (0, Some("x")), (5, Some("y")), (10, None), (30, Some("z")),
            (70, None), (80, Some("x")), (200, None),
        ];
        let run = || {
            let mut table = LivenessTable::new(TIMEOUT);
            script
                .iter()
                .filter_map(|(t, id)| table.observe(*id, ms(start, *t)))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
