/// Upper bound on how long a driver busy-waits for a hardware flag.
///
/// The default never gives up, which is the usual polling behaviour on AVR: a stuck bus hangs the
/// caller. A bounded limit turns the hang into an error after a fixed number of polls, which makes
/// hangs reproducible under test and lets firmware recover from a stuck bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollLimit(Option<u32>);

/// A bounded wait ran out of polls
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Expired;

impl PollLimit {
    /// Spin until the condition holds, however long that takes
    pub const UNBOUNDED: Self = PollLimit(None);

    /// Give up after `n` unsuccessful polls
    pub const fn iterations(n: u32) -> Self {
        PollLimit(Some(n))
    }

    /// Poll count, or `None` if unbounded
    pub const fn get(self) -> Option<u32> {
        self.0
    }

    /// Poll `cond` until it returns true or the limit is used up
    #[inline]
    pub(crate) fn wait<F: FnMut() -> bool>(self, mut cond: F) -> Result<(), Expired> {
        match self.0 {
            None => {
                while !cond() {}
                Ok(())
            }
            Some(n) => {
                for _ in 0..n {
                    if cond() {
                        return Ok(());
                    }
                }
                // One last look so a zero limit still observes a flag that is already set
                if cond() {
                    Ok(())
                } else {
                    Err(Expired)
                }
            }
        }
    }
}
