use core::fmt;

/// A storage location in the module's template library.
///
/// Valid ids are 1 through 127 inclusive. Constructing the value validates
/// the range, so driver and workflow calls that take a `TemplateSlot` can
/// never put an out-of-range page id on the wire; operator input has to go
/// through [`TemplateSlot::new`] and deal with the error there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TemplateSlot(u8);

/// Rejected slot id, raw value preserved for the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSlot(pub u16);

impl fmt::Display for InvalidSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slot id {} outside the valid range {}-{}",
            self.0,
            TemplateSlot::MIN,
            TemplateSlot::MAX
        )
    }
}

impl TemplateSlot {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 127;

    pub fn new(id: u16) -> Result<Self, InvalidSlot> {
        if id >= Self::MIN as u16 && id <= Self::MAX as u16 {
            Ok(Self(id as u8))
        } else {
            Err(InvalidSlot(id))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The flash page id used on the wire.
    pub(crate) fn page_id(self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for TemplateSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read-only mirror of the module's template directory.
///
/// The set of occupied slots is owned entirely by the sensor; this mirror is
/// whatever the last `ReadIndexTable` reply said and goes stale after any
/// enroll or delete until the session refreshes it. Index page 0 covers
/// slots 0..=255, which contains the whole valid 1..=127 slot space, so one
/// page is all that is ever read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateDirectory {
    bitmap: [u8; 32],
}

impl TemplateDirectory {
    /// A directory with no occupied slots, the state before the first
    /// refresh.
    pub fn empty() -> Self {
        Self { bitmap: [0; 32] }
    }

    /// Wraps a raw index-table page. Bit `n` set means slot `n` holds a
    /// template; bits outside 1..=127 are ignored by every accessor.
    pub fn from_bitmap(bitmap: [u8; 32]) -> Self {
        Self { bitmap }
    }

    pub fn contains(&self, slot: TemplateSlot) -> bool {
        let n = slot.get() as usize;
        self.bitmap[n / 8] & (1 << (n % 8)) != 0
    }

    /// Occupied slots in ascending order.
    pub fn iter(&self) -> SlotIter<'_> {
        SlotIter {
            directory: self,
            next: TemplateSlot::MIN,
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Highest occupied slot, if any.
    pub fn max_slot(&self) -> Option<TemplateSlot> {
        self.iter().last()
    }

    /// The slot a new enrollment should go to: one past the highest
    /// occupied slot, never reusing an occupied one. An empty directory
    /// starts at slot 1; a directory whose highest slot is 127 has no room
    /// left under this policy and yields `None`.
    pub fn next_slot(&self) -> Option<TemplateSlot> {
        match self.max_slot() {
            None => Some(TemplateSlot(TemplateSlot::MIN)),
            Some(max) => TemplateSlot::new(max.page_id() + 1).ok(),
        }
    }
}

/// Iterator over the occupied slots of a [`TemplateDirectory`].
#[derive(Debug)]
pub struct SlotIter<'a> {
    directory: &'a TemplateDirectory,
    next: u8,
}

impl<'a> Iterator for SlotIter<'a> {
    type Item = TemplateSlot;

    fn next(&mut self) -> Option<TemplateSlot> {
        while self.next <= TemplateSlot::MAX {
            let candidate = TemplateSlot(self.next);
            self.next += 1;
            if self.directory.contains(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory_of(slots: &[u16]) -> TemplateDirectory {
        let mut bitmap = [0u8; 32];
        for &slot in slots {
            bitmap[(slot / 8) as usize] |= 1 << (slot % 8);
        }
        TemplateDirectory::from_bitmap(bitmap)
    }

    #[test]
    fn slot_range_is_validated() {
        assert!(TemplateSlot::new(1).is_ok());
        assert!(TemplateSlot::new(127).is_ok());
        assert_eq!(TemplateSlot::new(0), Err(InvalidSlot(0)));
        assert_eq!(TemplateSlot::new(128), Err(InvalidSlot(128)));
        assert_eq!(TemplateSlot::new(200), Err(InvalidSlot(200)));
    }

    #[test]
    fn iteration_is_ascending() {
        let dir = directory_of(&[5, 1, 2]);
        let ids: [u8; 3] = {
            let mut it = dir.iter();
            [
                it.next().unwrap().get(),
                it.next().unwrap().get(),
                it.next().unwrap().get(),
            ]
        };
        assert_eq!(ids, [1, 2, 5]);
        assert_eq!(dir.len(), 3);
    }

    #[test]
    fn contains_matches_bitmap() {
        let dir = directory_of(&[1, 2, 5]);
        assert!(dir.contains(TemplateSlot::new(5).unwrap()));
        assert!(!dir.contains(TemplateSlot::new(4).unwrap()));
    }

    #[test]
    fn next_slot_is_one_past_the_maximum() {
        let dir = directory_of(&[1, 2, 5]);
        assert_eq!(dir.next_slot(), Some(TemplateSlot::new(6).unwrap()));
    }

    #[test]
    fn empty_directory_starts_at_one() {
        let dir = TemplateDirectory::empty();
        assert!(dir.is_empty());
        assert_eq!(dir.next_slot(), Some(TemplateSlot::new(1).unwrap()));
    }

    #[test]
    fn full_directory_has_no_next_slot() {
        let dir = directory_of(&[127]);
        assert_eq!(dir.next_slot(), None);
    }

    #[test]
    fn out_of_range_bits_are_ignored() {
        // slot 0 and slots above 127 can appear in a raw index page written
        // by other tooling; the mirror must not surface them
        let mut bitmap = [0u8; 32];
        bitmap[0] |= 1; // slot 0
        bitmap[16] |= 1; // slot 128
        bitmap[31] = 0xFF; // slots 248..=255
        let dir = TemplateDirectory::from_bitmap(bitmap);
        assert!(dir.is_empty());
        assert_eq!(dir.next_slot(), Some(TemplateSlot::new(1).unwrap()));
    }
}
