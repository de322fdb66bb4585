use serde::{Deserialize, Serialize};

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub usize);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(index: usize) -> Self {
                Self(index)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

index_type!(
    /// Row of a call-node table. One call node is one distinct call path.
    CallNodeIndex
);

index_type!(
    /// Row of a thread's function table.
    FuncIndex
);

index_type!(
    /// Row of a thread's stack table.
    StackIndex
);

/// The functions from a root down to some call node.
pub type CallNodePath = Vec<FuncIndex>;
