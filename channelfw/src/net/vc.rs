use std::fmt;

use crate::utils::id::gen_id;

/// Opaque handle identifying one connection instance.
///
/// It is handed to every completion callback and returned from reads that
/// complete inline, so work can be matched to its connection on whichever
/// thread it lands. It carries identity only; holding one keeps nothing
/// alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualConnection(u64);

impl VirtualConnection {
    pub(crate) fn new() -> Self {
        Self(gen_id())
    }

    /// Numeric id, unique within the process.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for VirtualConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualConnection({})", self.0)
    }
}

impl fmt::Display for VirtualConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vc-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::VirtualConnection;

    #[test]
    fn distinct_handles() {
        let a = VirtualConnection::new();
        let b = VirtualConnection::new();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.to_string(), format!("vc-{}", a.id()));
    }
}
