//! Temporary slot tracking.
//!
//! The TempFile plays the role a register file plays in a machine back end, but
//! for abstract, class-segregated storage slots. Each class owns an occupancy
//! table capped at a fixed ceiling and a high-water mark. Allocation always takes
//! the lowest free slot of the class so that slot numbering stays dense, which is
//! what keeps the final per-class counts (high-water + 1) small.

use super::triple::{TempClass, TempSlot};
use thiserror::Error;

/// Default ceiling of simultaneously live slots per class.
pub const MAX_TEMP_COUNT: usize = 1024;

/// Error types for slot bookkeeping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TempFileError {
    /// Every slot of the class is occupied.
    #[error("no free {class} temporary (limit {limit})")]
    Exhausted { class: TempClass, limit: usize },
    /// Slot index is beyond the class ceiling.
    #[error("temporary {0} is out of range")]
    OutOfRange(TempSlot),
}

/// Occupancy tables and high-water marks for all temp classes of one unit.
#[derive(Debug, Clone)]
pub struct TempFile {
    /// Slot ceiling per class.
    limit: usize,
    /// Occupancy per class; grows on demand up to `limit`.
    occupied: [Vec<bool>; TempClass::COUNT],
    /// Highest slot ever handed out per class.
    high_water: [Option<u32>; TempClass::COUNT],
}

impl TempFile {
    /// Create a table with the given ceiling.
    ///
    /// # Arguments
    /// * `limit` - maximum simultaneously live slots per class
    /// * `var_count` - number of variable slots the front end reserved; the
    ///   variable class is sized by this bound rather than by the scan
    pub fn new(limit: usize, var_count: u32) -> Self {
        let mut high_water = [None; TempClass::COUNT];
        high_water[TempClass::Var.index()] = var_count.checked_sub(1);
        Self {
            limit,
            occupied: Default::default(),
            high_water,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Take the lowest free slot of `class`.
    pub fn allocate(&mut self, class: TempClass) -> Result<TempSlot, TempFileError> {
        let table = &mut self.occupied[class.index()];
        let index = match table.iter().position(|&used| !used) {
            Some(free) => free,
            None if table.len() < self.limit => {
                table.push(false);
                table.len() - 1
            }
            None => {
                return Err(TempFileError::Exhausted {
                    class,
                    limit: self.limit,
                })
            }
        };
        table[index] = true;

        let index = index as u32;
        let hw = &mut self.high_water[class.index()];
        if hw.map_or(true, |h| index > h) {
            *hw = Some(index);
        }
        Ok(TempSlot::new(class, index))
    }

    /// Raise the high-water mark of the slot's class to cover a slot that was
    /// assigned outside this table. The slot does not become live.
    pub fn reserve(&mut self, slot: TempSlot) -> Result<(), TempFileError> {
        if slot.index as usize >= self.limit {
            return Err(TempFileError::OutOfRange(slot));
        }
        let hw = &mut self.high_water[slot.class.index()];
        if hw.map_or(true, |h| slot.index > h) {
            *hw = Some(slot.index);
        }
        Ok(())
    }

    /// Return a slot to its class. Returns whether it was occupied; a slot
    /// already dropped by [`TempFile::clear_class`] is not an error.
    pub fn free(&mut self, slot: TempSlot) -> Result<bool, TempFileError> {
        if slot.index as usize >= self.limit {
            return Err(TempFileError::OutOfRange(slot));
        }
        match self.occupied[slot.class.index()].get_mut(slot.index as usize) {
            Some(used) => Ok(std::mem::replace(used, false)),
            None => Ok(false),
        }
    }

    /// Mark every slot of `class` free. Returns how many were live.
    pub fn clear_class(&mut self, class: TempClass) -> usize {
        let table = &mut self.occupied[class.index()];
        let live = table.iter().filter(|&&used| used).count();
        table.fill(false);
        live
    }

    pub fn is_occupied(&self, slot: TempSlot) -> bool {
        self.occupied[slot.class.index()]
            .get(slot.index as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Number of currently occupied slots in `class`.
    pub fn live_count(&self, class: TempClass) -> usize {
        self.occupied[class.index()].iter().filter(|&&used| used).count()
    }

    pub fn high_water(&self, class: TempClass) -> Option<u32> {
        self.high_water[class.index()]
    }

    /// Final slot count per class (high-water + 1).
    pub fn counts(&self) -> [u32; TempClass::COUNT] {
        let mut counts = [0; TempClass::COUNT];
        for class in TempClass::ALL {
            counts[class.index()] = self.high_water(class).map_or(0, |h| h + 1);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_lowest_free_slot() {
        let mut tf = TempFile::new(8, 0);
        let a = tf.allocate(TempClass::Val).unwrap();
        let b = tf.allocate(TempClass::Val).unwrap();
        let c = tf.allocate(TempClass::Val).unwrap();
        assert_eq!((a.index, b.index, c.index), (0, 1, 2));

        assert!(tf.free(b).unwrap());
        let d = tf.allocate(TempClass::Val).unwrap();
        assert_eq!(d.index, 1);
        assert_eq!(tf.high_water(TempClass::Val), Some(2));
    }

    #[test]
    fn test_classes_are_independent() {
        let mut tf = TempFile::new(8, 0);
        let v = tf.allocate(TempClass::Val).unwrap();
        let i = tf.allocate(TempClass::Int).unwrap();
        assert_eq!(v.index, 0);
        assert_eq!(i.index, 0);
        assert!(tf.is_occupied(v));
        assert!(tf.is_occupied(i));
        assert!(!tf.is_occupied(TempSlot::new(TempClass::CodeAddr, 0)));
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut tf = TempFile::new(2, 0);
        tf.allocate(TempClass::Int).unwrap();
        tf.allocate(TempClass::Int).unwrap();
        let err = tf.allocate(TempClass::Int).unwrap_err();
        assert_eq!(
            err,
            TempFileError::Exhausted {
                class: TempClass::Int,
                limit: 2
            }
        );
        // other classes are unaffected
        assert!(tf.allocate(TempClass::Val).is_ok());
    }

    #[test]
    fn test_free_after_clear_is_lenient() {
        let mut tf = TempFile::new(4, 0);
        let s = tf.allocate(TempClass::ValAddr).unwrap();
        assert_eq!(tf.free(s), Ok(true));
        assert_eq!(tf.free(s), Ok(false));
        let far = TempSlot::new(TempClass::ValAddr, 9);
        assert_eq!(tf.free(far), Err(TempFileError::OutOfRange(far)));
    }

    #[test]
    fn test_clear_class_keeps_high_water() {
        let mut tf = TempFile::new(4, 0);
        tf.allocate(TempClass::Val).unwrap();
        tf.allocate(TempClass::Val).unwrap();
        assert_eq!(tf.clear_class(TempClass::Val), 2);
        assert_eq!(tf.live_count(TempClass::Val), 0);
        assert_eq!(tf.high_water(TempClass::Val), Some(1));
        assert_eq!(tf.allocate(TempClass::Val).unwrap().index, 0);
    }

    #[test]
    fn test_reserve_raises_high_water_only() {
        let mut tf = TempFile::new(4, 2);
        tf.reserve(TempSlot::new(TempClass::Val, 2)).unwrap();
        tf.reserve(TempSlot::new(TempClass::Val, 1)).unwrap();
        tf.reserve(TempSlot::new(TempClass::Var, 0)).unwrap();
        assert_eq!(tf.counts(), [2, 3, 0, 0, 0]);
        assert_eq!(tf.live_count(TempClass::Val), 0);
        assert_eq!(tf.allocate(TempClass::Val).unwrap().index, 0);

        let far = TempSlot::new(TempClass::Int, 4);
        assert_eq!(tf.reserve(far), Err(TempFileError::OutOfRange(far)));
    }

    #[test]
    fn test_var_class_sized_by_bound() {
        let tf = TempFile::new(4, 3);
        assert_eq!(tf.high_water(TempClass::Var), Some(2));
        assert_eq!(tf.counts(), [3, 0, 0, 0, 0]);
        assert_eq!(TempFile::new(4, 0).counts(), [0; 5]);
    }
}
