//! Consecutive-observation debounce for automatic route changes.

/// Default number of agreeing observations tolerated before the gate commits.
///
/// The gate commits once the streak *exceeds* this value, so the default
/// commits on the fifth consecutive observation.
pub const DEFAULT_DEBOUNCE_THRESHOLD: u8 = 4;

/// Per-tick input to the [`DebounceGate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Observation<T> {
    /// Current configuration already matches what the probes report.
    Steady,
    /// Probes suggest moving to `T`.
    Change(T),
}

/// Counts consecutive observations that agree on a change target.
///
/// A steady observation or a change toward a different target breaks the
/// streak. The counter never exceeds `threshold + 1`; reaching it emits the
/// target and resets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DebounceGate<T> {
    count: u16,
    threshold: u8,
    target: Option<T>,
}

impl<T> DebounceGate<T>
where
    T: Copy + Eq,
{
    #[must_use]
    pub const fn new(threshold: u8) -> Self {
        Self {
            count: 0,
            threshold,
            target: None,
        }
    }

    /// Feeds one observation and returns the target when the streak commits.
    pub fn observe(&mut self, observation: Observation<T>) -> Option<T> {
        let target = match observation {
            Observation::Steady => {
                self.reset();
                return None;
            }
            Observation::Change(target) => target,
        };

        if self.target != Some(target) {
            self.target = Some(target);
            self.count = 0;
        }

        self.count += 1;
        if self.count > u16::from(self.threshold) {
            self.reset();
            Some(target)
        } else {
            None
        }
    }

    /// Drops any in-progress streak.
    pub fn reset(&mut self) {
        self.count = 0;
        self.target = None;
    }

    /// Length of the current streak.
    #[must_use]
    pub const fn count(&self) -> u16 {
        self.count
    }

    /// Number of agreeing observations needed to commit.
    #[must_use]
    pub const fn commit_after(&self) -> u16 {
        self.threshold as u16 + 1
    }

    /// Target of the in-progress streak, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<&T> {
        self.target.as_ref()
    }
}

impl<T> Default for DebounceGate<T>
where
    T: Copy + Eq,
{
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum Target {
        Left,
        Right,
    }

    #[test]
    fn commits_on_fifth_agreeing_observation() {
        let mut gate = DebounceGate::<Target>::default();
        for expected in 1..=4 {
            assert_eq!(gate.observe(Observation::Change(Target::Left)), None);
            assert_eq!(gate.count(), expected);
        }
        assert_eq!(
            gate.observe(Observation::Change(Target::Left)),
            Some(Target::Left)
        );
        assert_eq!(gate.count(), 0);
        assert!(gate.pending().is_none());
    }

    #[test]
    fn steady_observation_restarts_the_streak() {
        let mut gate = DebounceGate::<Target>::default();
        for _ in 0..4 {
            assert_eq!(gate.observe(Observation::Change(Target::Left)), None);
        }
        assert_eq!(gate.observe(Observation::Steady), None);
        assert_eq!(gate.count(), 0);

        for _ in 0..4 {
            assert_eq!(gate.observe(Observation::Change(Target::Left)), None);
        }
        assert_eq!(
            gate.observe(Observation::Change(Target::Left)),
            Some(Target::Left)
        );
    }

    #[test]
    fn switching_target_restarts_the_streak() {
        let mut gate = DebounceGate::<Target>::default();
        for _ in 0..3 {
            gate.observe(Observation::Change(Target::Left));
        }
        assert_eq!(gate.observe(Observation::Change(Target::Right)), None);
        assert_eq!(gate.count(), 1);
        assert_eq!(gate.pending(), Some(&Target::Right));

        for _ in 0..3 {
            assert_eq!(gate.observe(Observation::Change(Target::Right)), None);
        }
        assert_eq!(
            gate.observe(Observation::Change(Target::Right)),
            Some(Target::Right)
        );
    }

    #[test]
    fn zero_threshold_commits_immediately() {
        let mut gate = DebounceGate::<Target>::new(0);
        assert_eq!(gate.commit_after(), 1);
        assert_eq!(
            gate.observe(Observation::Change(Target::Right)),
            Some(Target::Right)
        );
    }

    #[test]
    fn maximum_threshold_still_commits() {
        let mut gate = DebounceGate::<Target>::new(u8::MAX);
        assert_eq!(gate.commit_after(), 256);
        for _ in 0..u8::MAX {
            assert_eq!(gate.observe(Observation::Change(Target::Left)), None);
        }
        assert_eq!(gate.count(), 255);
        assert_eq!(
            gate.observe(Observation::Change(Target::Left)),
            Some(Target::Left)
        );
    }

    #[test]
    fn reset_discards_progress() {
        let mut gate = DebounceGate::<Target>::default();
        gate.observe(Observation::Change(Target::Left));
        gate.observe(Observation::Change(Target::Left));
        gate.reset();
        assert_eq!(gate.count(), 0);
        assert!(gate.pending().is_none());
    }
}
