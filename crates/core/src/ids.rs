use serde::{Deserialize, Serialize};
use std::fmt;

/// Row ids are allocated by SQLite (or by the peer cache for `PeerId`) and are
/// only meaningful within one database file.
macro_rules! row_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

row_id!(PeerId);
row_id!(MessageId);
row_id!(FileRowId);

impl PeerId {
    /// The id following `self`; peer ids are allocated densely from zero.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_ids_order_numerically() {
        let a = PeerId::new(2);
        let b = PeerId::new(10);
        assert!(a < b);
        assert_eq!(a.next(), PeerId::new(3));
    }

    #[test]
    fn debug_names_the_kind() {
        assert_eq!(format!("{:?}", MessageId::new(7)), "MessageId(7)");
        assert_eq!(FileRowId::new(3).to_string(), "3");
    }
}
