use bitflags::bitflags;

bitflags! {
    /// Per-item state bits, stored as a single integer column.
    ///
    /// The two facets are independent: an item can be starred and read,
    /// starred and unread, and so on. "Read" means the `UNREAD` bit is clear.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: i64 {
        /// Item has not been read yet
        const UNREAD = 0x02;
        /// Item was starred by its owner
        const STARRED = 0x04;
    }
}

impl StatusFlags {
    /// Decode a stored `status` column.
    ///
    /// Bits this crate does not know about are retained so that writing the
    /// value back never drops them. The flag type is as wide as the column,
    /// so high and sign bits come back unchanged.
    pub fn from_column(value: i64) -> Self {
        Self::from_bits_retain(value)
    }

    /// Encode for binding against the `status` column.
    pub fn to_column(self) -> i64 {
        self.bits()
    }

    /// True when every bit of `mask` is set on `self`.
    ///
    /// This is the in-memory twin of the `(status & ?) = ?` predicate. An
    /// empty mask matches every status.
    pub fn matches(self, mask: StatusFlags) -> bool {
        self.bits() & mask.bits() == mask.bits()
    }

    pub fn is_unread(self) -> bool {
        self.contains(Self::UNREAD)
    }

    pub fn is_starred(self) -> bool {
        self.contains(Self::STARRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_do_not_overlap() {
        assert_eq!(StatusFlags::UNREAD.bits() & StatusFlags::STARRED.bits(), 0);
    }

    #[test]
    fn test_starred_mask_matches_unread_and_starred() {
        let status = StatusFlags::UNREAD | StatusFlags::STARRED;
        assert!(status.matches(StatusFlags::STARRED));
        assert!(!StatusFlags::UNREAD.matches(StatusFlags::STARRED));
    }

    #[test]
    fn test_empty_mask_matches_everything() {
        for status in [
            StatusFlags::empty(),
            StatusFlags::UNREAD,
            StatusFlags::STARRED,
            StatusFlags::all(),
        ] {
            assert!(status.matches(StatusFlags::empty()));
        }
    }

    #[test]
    fn test_unknown_bits_survive_column_round_trip() {
        let stored = 0x02 | 0x10;
        let status = StatusFlags::from_column(stored);
        assert!(status.is_unread());
        assert!(!status.is_starred());
        assert_eq!(status.to_column(), stored);
    }

    #[test]
    fn test_high_and_sign_bits_are_not_truncated() {
        let high = (1_i64 << 33) | 0x02;
        let status = StatusFlags::from_column(high);
        assert!(status.is_unread());
        assert_eq!(status.to_column(), high);

        let negative = StatusFlags::from_column(-1);
        assert!(negative.is_unread() && negative.is_starred());
        assert_eq!(negative.to_column(), -1);
        assert_eq!(StatusFlags::from_column(i64::MIN).to_column(), i64::MIN);
    }
}
