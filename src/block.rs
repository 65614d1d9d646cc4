use super::error::AllocError;
use std::alloc::{alloc_zeroed, dealloc, realloc, Layout};
use std::mem::{align_of, ManuallyDrop};
use std::ptr::NonNull;

/// Every block is word aligned so that the collector can scan it word by word.
pub const BLOCK_ALIGN: usize = align_of::<usize>();

/// A region obtained from the system allocator.
///
/// The region is always zero initialized, including any bytes added by
/// [`Block::resize`], so it may be read as a sequence of words at any time.
/// Dropping a block returns its memory to the system allocator.
pub struct Block {
    ptr: NonNull<u8>,
    size: usize,
}

// The block exclusively owns its region.
unsafe impl Send for Block {}

impl Block {
    pub fn new(size: usize) -> Result<Block, AllocError> {
        let layout = Self::layout_for(size)?;

        unsafe {
            let ptr = alloc_zeroed(layout);

            match NonNull::new(ptr) {
                Some(ptr) => Ok(Block { ptr, size }),
                None => Err(AllocError::OOM),
            }
        }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// The start address, used as the block's key.
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// The size that was requested for this block.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Grows or shrinks the block, possibly moving it. On failure the
    /// original block is handed back untouched.
    pub fn resize(self, new_size: usize) -> Result<Block, (Block, AllocError)> {
        let layouts = Self::layout_for(self.size).and_then(|old| Ok((old, Self::layout_for(new_size)?)));
        let (old_layout, new_layout) = match layouts {
            Ok(layouts) => layouts,
            Err(e) => return Err((self, e)),
        };

        let raw = unsafe { realloc(self.ptr.as_ptr(), old_layout, new_layout.size()) };
        let ptr = match NonNull::new(raw) {
            Some(ptr) => ptr,
            None => return Err((self, AllocError::OOM)),
        };

        // the old region now belongs to the new block
        let old = ManuallyDrop::new(self);

        if new_size > old.size {
            unsafe { ptr.as_ptr().add(old.size).write_bytes(0, new_size - old.size) };
        }

        Ok(Block {
            ptr,
            size: new_size,
        })
    }

    fn layout_for(size: usize) -> Result<Layout, AllocError> {
        // zero sized requests still get a unique address
        Layout::from_size_align(size.max(1), BLOCK_ALIGN).map_err(|_| AllocError::BadRequest)
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Ok(layout) = Self::layout_for(self.size) {
            unsafe { dealloc(self.ptr.as_ptr(), layout) }
        }
    }
}
