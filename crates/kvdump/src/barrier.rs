/// Counts arrivals toward a fixed target ("N of M done").
///
/// A barrier created with a target of zero is complete from the start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionBarrier {
    expected: usize,
    arrived: usize,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            arrived: 0,
        }
    }

    /// Records one arrival. Returns `true` only for the arrival that
    /// completes the barrier; arrivals past the target are ignored.
    pub fn arrive(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }
        self.arrived += 1;
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.arrived >= self.expected
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn arrived(&self) -> usize {
        self.arrived
    }

    pub fn remaining(&self) -> usize {
        self.expected.saturating_sub(self.arrived)
    }
}
