//! Types for representing branches and branch outcomes.

/// A branch outcome.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    /// Not taken
    N = 0,
    /// Taken
    T = 1
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::T => "t",
            Self::N => "n",
        };
        write!(f, "{}", s)
    }
}

impl std::ops::Not for Outcome {
    type Output = Self;
    fn not(self) -> Self {
        match self {
            Self::N => Self::T,
            Self::T => Self::N,
        }
    }
}

impl From<bool> for Outcome {
    fn from(x: bool) -> Self {
        match x {
            true => Self::T,
            false => Self::N
        }
    }
}
impl From<Outcome> for bool {
    fn from(x: Outcome) -> bool {
        match x {
            Outcome::T => true,
            Outcome::N => false,
        }
    }
}

/// A record of a retired branch, in program order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BranchRecord {
    /// The program counter value for this branch
    pub pc: usize,

    /// The resolved target address for this branch. For a not-taken
    /// branch this is the fall-through address.
    pub tgt: usize,

    /// The resolved outcome
    pub outcome: Outcome,
}
impl BranchRecord {
    pub fn new(pc: usize, tgt: usize, outcome: Outcome) -> Self {
        Self { pc, tgt, outcome }
    }

    /// Returns 'true' if the resolved target lies below the branch.
    pub fn is_backward(&self) -> bool {
        self.tgt < self.pc
    }

    pub fn is_taken(&self) -> bool {
        self.outcome == Outcome::T
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn outcome_conversions() {
        assert_eq!(Outcome::from(true), Outcome::T);
        assert_eq!(!Outcome::T, Outcome::N);
        let b: bool = Outcome::N.into();
        assert!(!b);
    }

    #[test]
    fn backward_records() {
        let r = BranchRecord::new(0x1010, 0x1000, Outcome::T);
        assert!(r.is_backward());
        let r = BranchRecord::new(0x1010, 0x1014, Outcome::N);
        assert!(!r.is_backward());
        assert!(!r.is_taken());
    }
}
