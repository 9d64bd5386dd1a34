//! Bookkeeping for every block issued by a [`Context`].
//!
//! Each live block has exactly one [`Owner`]: either the context itself or
//! another live block. The owner links form a forest rooted at the context,
//! and each record keeps an ordered index of the blocks it owns so a cascade
//! never has to scan the whole table.
//!
//! The registry only stores and re-links records. Running destructors needs
//! the whole [`Context`], so the cascading teardown lives there and drives the
//! registry one record at a time.

use alloc::boxed::Box;
use core::{fmt, ptr::NonNull};

use flow_context_internals::{BlockError, RawBlock};
use hashbrown::HashMap;
use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use crate::{context::Context, location::SourceLocation};

type ChildSet = IndexSet<Address, FxBuildHasher>;

/// Opaque handle to a live block.
///
/// An address stays valid until the block is destroyed or moved by
/// [`Context::reallocate`]. Handles are only meaningful to the context that
/// issued them.
///
/// A handle must not be used after its block is destroyed or moved. The
/// allocator may hand the same address to a newer block, and the stale handle
/// then names that block: operations through it act on the newer block
/// instead of reporting [`Status::ItemDoesNotExist`].
///
/// [`Status::ItemDoesNotExist`]: crate::Status::ItemDoesNotExist
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(NonNull<u8>);

impl Address {
    /// The numeric value of the address.
    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:p})", self.0)
    }
}

impl fmt::Pointer for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.0, f)
    }
}

/// Who is responsible for tearing a block down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// The context root. The block lives until it is destroyed explicitly or
    /// the context begins termination.
    #[default]
    Context,
    /// Another live block. Destroying that block destroys this one first.
    Block(Address),
}

impl From<Address> for Owner {
    fn from(address: Address) -> Self {
        Self::Block(address)
    }
}

/// Cleanup run when a block is destroyed.
///
/// The callback receives the context and the block's address while the
/// block's memory is still readable, and returns `false` to report failure.
/// A failure is recorded on the context but never stops the surrounding
/// teardown.
///
/// ```
/// use flow_context::{Context, Destructor, Owner};
///
/// let mut context = Context::try_new().unwrap();
/// let block = context
///     .allocate(
///         4,
///         Some(Destructor::new(|context, block| {
///             context.block(block) == Some(&[0u8; 4][..])
///         })),
///         Owner::Context,
///     )
///     .unwrap();
/// assert!(context.destroy_block(block));
/// ```
pub struct Destructor(Box<dyn FnOnce(&mut Context, Address) -> bool>);

impl Destructor {
    /// Wraps a cleanup callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(&mut Context, Address) -> bool + 'static,
    {
        Self(Box::new(callback))
    }

    #[inline]
    pub(crate) fn run(self, context: &mut Context, block: Address) -> bool {
        (self.0)(context, block)
    }
}

impl fmt::Debug for Destructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Destructor(..)")
    }
}

/// A read-only view of one live block, yielded by [`Context::allocations`].
#[derive(Debug, Clone, Copy)]
pub struct AllocationInfo<'a> {
    /// The block's address.
    pub address: Address,
    /// The requested size in bytes.
    pub size: usize,
    /// The block's owner.
    pub owner: Owner,
    /// Where the block was allocated.
    pub location: &'a SourceLocation,
    /// Number of blocks directly owned by this one.
    pub children: usize,
    /// Whether a destructor is installed.
    pub has_destructor: bool,
}

/// Running totals for a context's blocks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    /// Blocks currently live.
    pub live_blocks: usize,
    /// Bytes currently live, counting requested sizes.
    pub live_bytes: usize,
    /// The highest `live_bytes` ever reached.
    pub peak_bytes: usize,
    /// Blocks ever allocated, including those already destroyed.
    pub total_allocations: u64,
}

impl MemoryStats {
    fn grow(&mut self, bytes: usize) {
        self.live_bytes = self.live_bytes.saturating_add(bytes);
        self.peak_bytes = self.peak_bytes.max(self.live_bytes);
    }

    fn shrink(&mut self, bytes: usize) {
        self.live_bytes = self.live_bytes.saturating_sub(bytes);
    }
}

/// A live block and its metadata.
#[derive(Debug)]
pub(crate) struct Record {
    block: RawBlock,
    destructor: Option<Destructor>,
    owner: Owner,
    children: ChildSet,
    location: SourceLocation,
}

impl Record {
    #[inline]
    pub(crate) fn owner(&self) -> Owner {
        self.owner
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    records: HashMap<Address, Record, FxBuildHasher>,
    roots: ChildSet,
    stats: MemoryStats,
}

impl Registry {
    #[inline]
    pub(crate) fn contains(&self, address: Address) -> bool {
        self.records.contains_key(&address)
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn owner_exists(&self, owner: Owner) -> bool {
        match owner {
            Owner::Context => true,
            Owner::Block(address) => self.contains(address),
        }
    }

    /// Registers a freshly reserved block. The owner must already exist.
    pub(crate) fn insert(
        &mut self,
        block: RawBlock,
        destructor: Option<Destructor>,
        owner: Owner,
        location: SourceLocation,
    ) -> Address {
        let address = Address(block.as_non_null());
        let size = block.len();
        if let Some(siblings) = self.siblings_mut(owner) {
            siblings.insert(address);
        }
        self.records.insert(
            address,
            Record {
                block,
                destructor,
                owner,
                children: ChildSet::default(),
                location,
            },
        );
        self.stats.live_blocks += 1;
        self.stats.total_allocations += 1;
        self.stats.grow(size);
        address
    }

    #[inline]
    pub(crate) fn get(&self, address: Address) -> Option<&Record> {
        self.records.get(&address)
    }

    pub(crate) fn size_of(&self, address: Address) -> Option<usize> {
        self.get(address).map(|record| record.block.len())
    }

    pub(crate) fn block(&self, address: Address) -> Option<&[u8]> {
        self.get(address).map(|record| record.block.as_slice())
    }

    pub(crate) fn block_mut(&mut self, address: Address) -> Option<&mut [u8]> {
        self.records
            .get_mut(&address)
            .map(|record| record.block.as_mut_slice())
    }

    /// The most recently attached block owned directly by `address`.
    pub(crate) fn last_child(&self, address: Address) -> Option<Address> {
        self.get(address)?.children.last().copied()
    }

    /// The most recently attached block owned by the context root.
    pub(crate) fn last_root(&self) -> Option<Address> {
        self.roots.last().copied()
    }

    /// Removes the destructor of `address`, together with the allocation site
    /// used to describe a failure.
    pub(crate) fn take_destructor(
        &mut self,
        address: Address,
    ) -> Option<(Destructor, SourceLocation)> {
        let record = self.records.get_mut(&address)?;
        let destructor = record.destructor.take()?;
        Some((destructor, record.location.clone()))
    }

    pub(crate) fn set_destructor(
        &mut self,
        address: Address,
        destructor: Option<Destructor>,
    ) -> Option<Option<Destructor>> {
        let record = self.records.get_mut(&address)?;
        Some(core::mem::replace(&mut record.destructor, destructor))
    }

    /// Unregisters `address` and unlinks it from its owner.
    ///
    /// Blocks it still owns are handed to the context root so no record is
    /// ever left pointing at a missing owner.
    pub(crate) fn detach(&mut self, address: Address) -> Option<Record> {
        let mut record = self.records.remove(&address)?;
        if let Some(siblings) = self.siblings_mut(record.owner) {
            siblings.shift_remove(&address);
        }
        for child in core::mem::take(&mut record.children) {
            if let Some(orphan) = self.records.get_mut(&child) {
                orphan.owner = Owner::Context;
                self.roots.insert(child);
            }
        }
        self.stats.live_blocks -= 1;
        self.stats.shrink(record.block.len());
        Some(record)
    }

    /// Returns `true` if making `owner` the owner of `address` would close a
    /// cycle.
    pub(crate) fn would_cycle(&self, address: Address, owner: Owner) -> bool {
        let mut current = owner;
        while let Owner::Block(ancestor) = current {
            if ancestor == address {
                return true;
            }
            match self.get(ancestor) {
                Some(record) => current = record.owner,
                None => return false,
            }
        }
        false
    }

    /// Moves `address` under `owner`, as its newest child. Both must exist.
    pub(crate) fn reparent(&mut self, address: Address, owner: Owner) {
        let Some(record) = self.records.get_mut(&address) else {
            return;
        };
        let previous = core::mem::replace(&mut record.owner, owner);
        if let Some(siblings) = self.siblings_mut(previous) {
            siblings.shift_remove(&address);
        }
        if let Some(siblings) = self.siblings_mut(owner) {
            siblings.insert(address);
        }
    }

    /// Resizes a live block, re-keying its links if it moved.
    ///
    /// Returns `Ok(None)` if `address` is not live. On failure the block is
    /// left untouched.
    pub(crate) fn resize(
        &mut self,
        address: Address,
        new_size: usize,
    ) -> Result<Option<Address>, BlockError> {
        let Some(record) = self.records.get_mut(&address) else {
            return Ok(None);
        };
        let old_size = record.block.len();
        record.block.try_resize(new_size)?;
        let moved = Address(record.block.as_non_null());

        self.stats.shrink(old_size);
        self.stats.grow(new_size);

        if moved != address {
            self.rekey(address, moved);
        }
        Ok(Some(moved))
    }

    fn rekey(&mut self, from: Address, to: Address) {
        let Some(record) = self.records.remove(&from) else {
            return;
        };
        for child in &record.children {
            if let Some(child) = self.records.get_mut(child) {
                child.owner = Owner::Block(to);
            }
        }
        let owner = record.owner;
        self.records.insert(to, record);
        if let Some(siblings) = self.siblings_mut(owner)
            && let Some(index) = siblings.get_index_of(&from)
        {
            siblings.shift_remove_index(index);
            siblings.shift_insert(index, to);
        }
    }

    fn siblings_mut(&mut self, owner: Owner) -> Option<&mut ChildSet> {
        match owner {
            Owner::Context => Some(&mut self.roots),
            Owner::Block(parent) => self
                .records
                .get_mut(&parent)
                .map(|record| &mut record.children),
        }
    }

    pub(crate) fn allocations(&self) -> impl Iterator<Item = AllocationInfo<'_>> + '_ {
        self.records.iter().map(|(&address, record)| AllocationInfo {
            address,
            size: record.block.len(),
            owner: record.owner,
            location: &record.location,
            children: record.children.len(),
            has_destructor: record.destructor.is_some(),
        })
    }

    #[inline]
    pub(crate) fn stats(&self) -> MemoryStats {
        self.stats
    }

    /// Drops every record without running any destructor.
    pub(crate) fn release_all(&mut self) {
        let released = self.records.len();
        self.records.clear();
        self.roots.clear();
        self.stats.live_blocks = 0;
        self.stats.live_bytes = 0;
        if released > 0 {
            tracing::debug!(released, "blocks released without running destructors");
        }
    }
}
