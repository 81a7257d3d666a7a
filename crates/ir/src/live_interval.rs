use std::fmt;

/// Where a live interval ends up after register allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    #[default]
    None,
    Reg(u16),
    Slot(u32),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::None => write!(f, "-"),
            Location::Reg(r) => write!(f, "r{r}"),
            Location::Slot(s) => write!(f, "s{s}"),
        }
    }
}

/// Half-open `[start, end)` live interval of a value, in live numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveInterval {
    pub start: u32,
    pub end: u32,
    pub location: Location,
}

impl LiveInterval {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end, location: Location::None }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Widens the interval to cover `[start, end)` as well.
    pub fn extend(&mut self, start: u32, end: u32) {
        self.start = self.start.min(start);
        self.end = self.end.max(end);
    }

    /// Pins the start without touching the end. Used when the defining
    /// instruction is reached after uses already stretched the interval.
    pub fn set_start(&mut self, start: u32) {
        self.start = start;
    }
}

/// Live-number span of a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveRange {
    pub start: u32,
    pub end: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_widens_both_ends() {
        let mut iv = LiveInterval::new(10, 12);
        iv.extend(4, 8);
        assert_eq!((iv.start, iv.end), (4, 12));
        iv.extend(6, 20);
        assert_eq!((iv.start, iv.end), (4, 20));
    }

    #[test]
    fn empty_intervals() {
        assert!(LiveInterval::new(4, 4).is_empty());
        assert!(!LiveInterval::new(4, 6).is_empty());
    }
}
