use std::fmt;

use crate::config::PAGE_SIZE;

/// Identifies a page on the disk store. Only equality and hashing carry meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(u32);

impl PageId {
    /// Sentinel for "no page"
    pub const INVALID: PageId = PageId(u32::MAX);

    pub const fn new(id: u32) -> Self {
        PageId(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    /// Byte offset of the page inside a flat database file
    pub const fn file_offset(self) -> u64 {
        self.0 as u64 * PAGE_SIZE as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "INVALID")
        }
    }
}

/// 32bit prev page + 32bit next page + 16bit slot count + 16bit free space end
pub const SLOTTED_PAGE_HEADER_SIZE: usize = 12;
/// 16bit offset + 16bit length
pub const SLOTTED_PAGE_SLOT_SIZE: usize = 4;
/// Largest record an empty page can hold
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - SLOTTED_PAGE_HEADER_SIZE - SLOTTED_PAGE_SLOT_SIZE;

const PREV_PAGE_OFFSET: usize = 0;
const NEXT_PAGE_OFFSET: usize = 4;
const SLOT_COUNT_OFFSET: usize = 8;
const FREE_END_OFFSET: usize = 10;

#[derive(Debug, PartialEq, Eq)]
pub enum SlotError {
    /// The slot is out of range or was deleted
    InvalidSlot(u16),
    LengthMismatch { expected: usize, actual: usize },
}

/// Slotted page layout used by heap files.
///
/// The slot array grows from the header towards the end of the page while
/// records are stored from the end of the page backwards. A slot whose offset
/// is 0 has been deleted and may be reused by a later insert.
///
/// The page does not own its bytes: it is a view over a pinned frame.
pub struct SlottedPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> SlottedPage<B> {
    pub fn new(data: B) -> Self {
        assert_eq!(
            data.as_ref().len(),
            PAGE_SIZE,
            "Slotted page must span exactly one page"
        );
        SlottedPage { data }
    }

    pub fn prev_page(&self) -> PageId {
        PageId::new(self.read_u32(PREV_PAGE_OFFSET))
    }

    pub fn next_page(&self) -> PageId {
        PageId::new(self.read_u32(NEXT_PAGE_OFFSET))
    }

    pub fn slot_count(&self) -> u16 {
        self.read_u16(SLOT_COUNT_OFFSET)
    }

    /// Contiguous free bytes between the slot array and the record area
    pub fn free_space(&self) -> usize {
        let slots_end =
            SLOTTED_PAGE_HEADER_SIZE + self.slot_count() as usize * SLOTTED_PAGE_SLOT_SIZE;
        (self.free_end() as usize).saturating_sub(slots_end)
    }

    /// Whether a record of `len` bytes can be inserted, counting the slot it needs
    pub fn can_fit(&self, len: usize) -> bool {
        let slot_cost = match self.find_dead_slot() {
            Some(_) => 0,
            None => SLOTTED_PAGE_SLOT_SIZE,
        };
        len + slot_cost <= self.free_space()
    }

    /// Lookups the slot array for the given slot number
    pub fn select_record(&self, slot: u16) -> Option<&[u8]> {
        let (offset, length) = self.live_slot(slot)?;
        let (offset, length) = (offset as usize, length as usize);

        assert!(
            offset + length <= PAGE_SIZE,
            "Page slot reported an invalid offset"
        );
        Some(&self.data.as_ref()[offset..offset + length])
    }

    pub fn first_record(&self) -> Option<u16> {
        self.live_slot_from(0)
    }

    pub fn next_record(&self, slot: u16) -> Option<u16> {
        self.live_slot_from(slot.checked_add(1)?)
    }

    /// Number of live records
    pub fn record_count(&self) -> usize {
        (0..self.slot_count())
            .filter(|slot| self.live_slot(*slot).is_some())
            .count()
    }

    /// Whether the header and the slot array describe a consistent page. Pages that
    /// fail this check must not be read through the other accessors.
    pub fn is_well_formed(&self) -> bool {
        let slots_end =
            SLOTTED_PAGE_HEADER_SIZE + self.slot_count() as usize * SLOTTED_PAGE_SLOT_SIZE;
        let free_end = self.free_end() as usize;
        if slots_end > free_end || free_end > PAGE_SIZE {
            return false;
        }

        (0..self.slot_count()).all(|slot| match self.slot(slot) {
            Some((0, _)) => true,
            // Empty records may sit below a reclaimed tail
            Some((offset, 0)) => offset as usize <= PAGE_SIZE,
            Some((offset, length)) => {
                offset as usize >= free_end && offset as usize + length as usize <= PAGE_SIZE
            }
            None => false,
        })
    }

    fn free_end(&self) -> u16 {
        self.read_u16(FREE_END_OFFSET)
    }

    fn slot(&self, slot: u16) -> Option<(u16, u16)> {
        if slot >= self.slot_count() {
            return None;
        }
        let at = SLOTTED_PAGE_HEADER_SIZE + slot as usize * SLOTTED_PAGE_SLOT_SIZE;
        Some((self.read_u16(at), self.read_u16(at + 2)))
    }

    fn live_slot(&self, slot: u16) -> Option<(u16, u16)> {
        self.slot(slot).filter(|(offset, _)| *offset != 0)
    }

    fn live_slot_from(&self, start: u16) -> Option<u16> {
        (start..self.slot_count()).find(|slot| self.live_slot(*slot).is_some())
    }

    fn find_dead_slot(&self) -> Option<u16> {
        (0..self.slot_count()).find(|slot| self.live_slot(*slot).is_none())
    }

    fn read_u16(&self, at: usize) -> u16 {
        let data = self.data.as_ref();
        u16::from_be_bytes([data[at], data[at + 1]])
    }

    fn read_u32(&self, at: usize) -> u32 {
        let data = self.data.as_ref();
        u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> SlottedPage<B> {
    /// Formats the page as an empty, unlinked slotted page
    pub fn init(&mut self) {
        self.set_prev_page(PageId::INVALID);
        self.set_next_page(PageId::INVALID);
        self.write_u16(SLOT_COUNT_OFFSET, 0);
        self.write_u16(FREE_END_OFFSET, PAGE_SIZE as u16);
    }

    pub fn set_prev_page(&mut self, page_id: PageId) {
        self.write_u32(PREV_PAGE_OFFSET, page_id.get());
    }

    pub fn set_next_page(&mut self, page_id: PageId) {
        self.write_u32(NEXT_PAGE_OFFSET, page_id.get());
    }

    /// Inserts a record and returns its slot, or None if the page is full.
    /// Deleted slots are reused before the slot array grows.
    pub fn insert_record(&mut self, record: &[u8]) -> Option<u16> {
        if !self.can_fit(record.len()) {
            return None;
        }

        let slot = match self.find_dead_slot() {
            Some(slot) => slot,
            None => {
                let slot = self.slot_count();
                self.write_u16(SLOT_COUNT_OFFSET, slot + 1);
                slot
            }
        };

        let offset = self.free_end() as usize - record.len();
        self.data.as_mut()[offset..offset + record.len()].copy_from_slice(record);
        self.write_u16(FREE_END_OFFSET, offset as u16);
        self.write_slot(slot, offset as u16, record.len() as u16);

        Some(slot)
    }

    /// Overwrites a record in place. The length must not change.
    pub fn update_record(&mut self, slot: u16, record: &[u8]) -> Result<(), SlotError> {
        let (offset, length) = self.live_slot(slot).ok_or(SlotError::InvalidSlot(slot))?;
        if length as usize != record.len() {
            return Err(SlotError::LengthMismatch {
                expected: length as usize,
                actual: record.len(),
            });
        }

        let offset = offset as usize;
        self.data.as_mut()[offset..offset + record.len()].copy_from_slice(record);
        Ok(())
    }

    /// Tombstones the slot. Only the space of the most recently placed record is
    /// given back to the free area; trailing dead slots are trimmed.
    pub fn delete_record(&mut self, slot: u16) -> Result<(), SlotError> {
        let (offset, length) = self.live_slot(slot).ok_or(SlotError::InvalidSlot(slot))?;

        if offset == self.free_end() {
            self.write_u16(FREE_END_OFFSET, offset + length);
        }
        self.write_slot(slot, 0, 0);

        let mut count = self.slot_count();
        while count > 0 && self.live_slot(count - 1).is_none() {
            count -= 1;
        }
        self.write_u16(SLOT_COUNT_OFFSET, count);

        Ok(())
    }

    fn write_slot(&mut self, slot: u16, offset: u16, length: u16) {
        let at = SLOTTED_PAGE_HEADER_SIZE + slot as usize * SLOTTED_PAGE_SLOT_SIZE;
        self.write_u16(at, offset);
        self.write_u16(at + 2, length);
    }

    fn write_u16(&mut self, at: usize, value: u16) {
        self.data.as_mut()[at..at + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn write_u32(&mut self, at: usize, value: u32) {
        self.data.as_mut()[at..at + 4].copy_from_slice(&value.to_be_bytes());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn empty_page() -> Vec<u8> {
        let mut data = vec![0u8; PAGE_SIZE];
        SlottedPage::new(data.as_mut_slice()).init();
        data
    }

    #[test]
    fn test_page_id_invalid() {
        assert!(!PageId::INVALID.is_valid());
        assert!(PageId::new(0).is_valid());
        assert_eq!(PageId::new(3).file_offset(), 3 * PAGE_SIZE as u64);
        assert_eq!(PageId::INVALID.to_string(), "INVALID");
    }

    #[test]
    fn test_init_links_nothing() {
        let data = empty_page();
        let page = SlottedPage::new(data.as_slice());
        assert_eq!(page.prev_page(), PageId::INVALID);
        assert_eq!(page.next_page(), PageId::INVALID);
        assert_eq!(page.slot_count(), 0);
        assert_eq!(page.free_space(), PAGE_SIZE - SLOTTED_PAGE_HEADER_SIZE);
        assert_eq!(page.first_record(), None);
    }

    #[test]
    fn test_insert_select_and_iterate() {
        let mut data = empty_page();
        let mut page = SlottedPage::new(data.as_mut_slice());

        let a = page.insert_record(b"alpha").unwrap();
        let b = page.insert_record(b"beta").unwrap();
        let c = page.insert_record(b"").unwrap();

        assert_eq!(page.select_record(a), Some(&b"alpha"[..]));
        assert_eq!(page.select_record(b), Some(&b"beta"[..]));
        assert_eq!(page.select_record(c), Some(&b""[..]));
        assert_eq!(page.record_count(), 3);

        assert_eq!(page.first_record(), Some(a));
        assert_eq!(page.next_record(a), Some(b));
        assert_eq!(page.next_record(b), Some(c));
        assert_eq!(page.next_record(c), None);
    }

    #[test]
    fn test_delete_reuses_slot_and_skips_dead_records() {
        let mut data = empty_page();
        let mut page = SlottedPage::new(data.as_mut_slice());

        let a = page.insert_record(b"one").unwrap();
        let b = page.insert_record(b"two").unwrap();
        let c = page.insert_record(b"three").unwrap();

        page.delete_record(b).unwrap();
        assert_eq!(page.select_record(b), None);
        assert_eq!(page.next_record(a), Some(c));
        assert_eq!(page.delete_record(b), Err(SlotError::InvalidSlot(b)));

        let reused = page.insert_record(b"four").unwrap();
        assert_eq!(reused, b);
        assert_eq!(page.select_record(reused), Some(&b"four"[..]));
    }

    #[test]
    fn test_delete_last_record_gives_space_back() {
        let mut data = empty_page();
        let mut page = SlottedPage::new(data.as_mut_slice());
        let before = page.free_space();

        let slot = page.insert_record(&[7u8; 100]).unwrap();
        assert_eq!(page.free_space(), before - 100 - SLOTTED_PAGE_SLOT_SIZE);

        page.delete_record(slot).unwrap();
        assert_eq!(page.slot_count(), 0);
        assert_eq!(page.free_space(), before);
    }

    #[test]
    fn test_update_requires_same_length() {
        let mut data = empty_page();
        let mut page = SlottedPage::new(data.as_mut_slice());
        let slot = page.insert_record(b"abcd").unwrap();

        page.update_record(slot, b"wxyz").unwrap();
        assert_eq!(page.select_record(slot), Some(&b"wxyz"[..]));

        assert_eq!(
            page.update_record(slot, b"too long"),
            Err(SlotError::LengthMismatch {
                expected: 4,
                actual: 8
            })
        );
    }

    #[test]
    fn test_page_fills_up() {
        let mut data = empty_page();
        let mut page = SlottedPage::new(data.as_mut_slice());

        assert!(page.insert_record(&[1u8; MAX_RECORD_SIZE + 1]).is_none());
        assert!(page.insert_record(&[1u8; MAX_RECORD_SIZE]).is_some());
        assert_eq!(page.free_space(), 0);
        assert!(page.insert_record(b"x").is_none());
    }

    #[test]
    fn test_links() {
        let mut data = empty_page();
        let mut page = SlottedPage::new(data.as_mut_slice());
        page.set_prev_page(PageId::new(4));
        page.set_next_page(PageId::new(9));
        assert_eq!(page.prev_page(), PageId::new(4));
        assert_eq!(page.next_page(), PageId::new(9));
    }

    #[test]
    fn test_well_formed_pages() {
        let mut data = empty_page();
        {
            let mut page = SlottedPage::new(data.as_mut_slice());
            let tail = page.insert_record(b"tail").unwrap();
            page.insert_record(b"").unwrap();
            page.delete_record(tail).unwrap();
            page.insert_record(b"kept").unwrap();
            assert!(page.is_well_formed());
        }

        // Never formatted
        let zeroed = vec![0u8; PAGE_SIZE];
        assert!(!SlottedPage::new(zeroed.as_slice()).is_well_formed());

        // A slot count running past the end of the page
        let mut garbage = empty_page();
        garbage[SLOT_COUNT_OFFSET..SLOT_COUNT_OFFSET + 2].copy_from_slice(&u16::MAX.to_be_bytes());
        assert!(!SlottedPage::new(garbage.as_slice()).is_well_formed());

        // A record running past the end of the page
        let mut garbage = empty_page();
        {
            let mut page = SlottedPage::new(garbage.as_mut_slice());
            let slot = page.insert_record(b"abc").unwrap();
            page.write_slot(slot, (PAGE_SIZE - 1) as u16, 3);
        }
        assert!(!SlottedPage::new(garbage.as_slice()).is_well_formed());
    }
}
