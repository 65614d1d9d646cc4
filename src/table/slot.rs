use crate::block::Block;

/// A tracked block together with its live mark.
pub struct Entry {
    block: Block,
    marked: bool,
}

impl Entry {
    pub fn new(block: Block) -> Self {
        Self {
            block,
            marked: false,
        }
    }

    pub fn addr(&self) -> usize {
        self.block.addr()
    }

    pub fn size(&self) -> usize {
        self.block.size()
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn set_mark(&mut self, marked: bool) {
        self.marked = marked;
    }

    pub fn into_block(self) -> Block {
        self.block
    }

    pub(crate) fn with_block(block: Block, marked: bool) -> Self {
        Self { block, marked }
    }
}

/// A tombstone can be reused by inserts but does not end a lookup's probe
/// sequence, an empty slot ends both.
pub enum Slot {
    Empty,
    Tombstone,
    Occupied(Entry),
}
