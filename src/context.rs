use core::fmt;

use flow_context_internals::RawBlock;

use crate::{
    config::ContextConfig,
    diagnostics::{Diagnostics, ErrorReport, ErrorState, Frame, RaisedError},
    error::AllocError,
    format::format_bounded,
    hooks::report_sink,
    location::SourceLocation,
    registry::{Address, AllocationInfo, Destructor, MemoryStats, Owner, Registry},
    status::Status,
};

/// Where a [`Context`] is in its lifecycle.
///
/// There is no `Destroyed` state: [`Context::destroy`] consumes the context.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextState {
    /// Created and accepting work.
    #[default]
    Active,
    /// [`Context::begin_terminate`] has run at least once.
    Terminating,
}

/// The handle threaded through one unit of work.
///
/// A context owns every block allocated through it and records the first
/// failure raised while the work runs, along with the call path that failure
/// travelled.
///
/// ```
/// use flow_context::{Context, Owner, Status};
///
/// let mut context = Context::try_new().unwrap();
/// let rows = context.allocate_owned_by_context(64).unwrap();
/// let row = context.allocate(16, None, Owner::Block(rows)).unwrap();
///
/// // Destroying the parent takes its children with it.
/// assert!(context.destroy_block(rows));
/// assert!(!context.contains(row));
///
/// flow_context::raise!(context, Status::InvalidDimensions, "row {} is empty", 3);
/// assert_eq!(context.status(), Status::InvalidDimensions);
///
/// assert!(context.begin_terminate());
/// context.destroy();
/// ```
pub struct Context {
    registry: Registry,
    diagnostics: Diagnostics,
    config: ContextConfig,
    state: ContextState,
}

impl Context {
    /// Creates a context with the default limits.
    pub fn try_new() -> Result<Self, AllocError> {
        Self::try_with_config(ContextConfig::DEFAULT)
    }

    /// Creates a context with the given limits.
    ///
    /// Storage for `config.max_frames` frames and `config.max_message_len`
    /// bytes of message is reserved here; failing to reserve it is the only
    /// way creation fails.
    pub fn try_with_config(config: ContextConfig) -> Result<Self, AllocError> {
        let diagnostics = Diagnostics::try_new(&config).map_err(|_| {
            let size = config
                .max_frames
                .saturating_mul(size_of::<Frame>())
                .saturating_add(config.max_message_len);
            tracing::error!(size, "could not reserve diagnostics storage");
            AllocError::OutOfMemory { size }
        })?;
        tracing::debug!(
            max_frames = config.max_frames,
            max_message_len = config.max_message_len,
            "context created"
        );
        Ok(Self {
            registry: Registry::default(),
            diagnostics,
            config,
            state: ContextState::Active,
        })
    }

    /// The limits this context was created with.
    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The lifecycle state.
    #[inline]
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Destroys every block still owned by the context root, cascading
    /// through what each one owns.
    ///
    /// Roots are torn down newest first. Returns `true` only if every
    /// destructor that ran reported success; failures are also raised as
    /// [`Status::DestructorFailed`]. The error channel stays readable, and
    /// this may be called again.
    pub fn begin_terminate(&mut self) -> bool {
        self.state = ContextState::Terminating;
        let live = self.registry.len();
        let mut succeeded = true;
        while let Some(root) = self.registry.last_root() {
            succeeded &= self.destroy_subtree(root);
        }
        tracing::debug!(destroyed = live, succeeded, "context terminated");
        succeeded
    }

    /// Releases the context and everything it still holds.
    ///
    /// No destructor runs here, whether or not [`begin_terminate`] ran or
    /// succeeded. Dropping the context has the same effect.
    ///
    /// [`begin_terminate`]: Context::begin_terminate
    pub fn destroy(mut self) {
        self.registry.release_all();
    }

    /// Emits the error report, with full paths, through the installed
    /// [report sink](crate::hooks::report_sink) if an error is live.
    ///
    /// Returns whether an error was live. The process is never exited.
    pub fn print_if_error(&self) -> bool {
        if !self.has_error() {
            return false;
        }
        report_sink::emit(&self.error_report(true));
        true
    }

    /// Allocates a zeroed block of `size` bytes, recording the caller as its
    /// allocation site.
    ///
    /// See [`allocate_at`](Context::allocate_at).
    #[track_caller]
    pub fn allocate(
        &mut self,
        size: usize,
        destructor: Option<Destructor>,
        owner: Owner,
    ) -> Result<Address, AllocError> {
        self.allocate_at(size, destructor, owner, SourceLocation::caller())
    }

    /// Allocates a zeroed block owned by the context root, with no
    /// destructor.
    #[track_caller]
    pub fn allocate_owned_by_context(&mut self, size: usize) -> Result<Address, AllocError> {
        self.allocate_at(size, None, Owner::Context, SourceLocation::caller())
    }

    /// Allocates a zeroed block of `size` bytes owned by `owner`.
    ///
    /// # Errors
    ///
    /// - [`AllocError::UnknownOwner`] if `owner` names a block that is not
    ///   live. [`Status::ItemDoesNotExist`] is raised.
    /// - [`AllocError::OutOfMemory`] if the memory cannot be reserved,
    ///   including sizes no allocation could satisfy.
    ///   [`Status::OutOfMemory`] is raised.
    pub fn allocate_at(
        &mut self,
        size: usize,
        destructor: Option<Destructor>,
        owner: Owner,
        location: SourceLocation,
    ) -> Result<Address, AllocError> {
        if let Owner::Block(parent) = owner
            && !self.registry.contains(parent)
        {
            crate::raise!(
                self,
                Status::ItemDoesNotExist,
                "Owner {parent:?} is not a live allocation (requested at {}:{})",
                location.file,
                location.line
            );
            return Err(AllocError::UnknownOwner(parent));
        }
        let block = match RawBlock::try_new(size) {
            Ok(block) => block,
            Err(error) => {
                crate::raise!(
                    self,
                    Status::OutOfMemory,
                    "Failed to allocate {size} bytes ({}:{})",
                    location.file,
                    location.line
                );
                return Err(error.into());
            }
        };
        let address = self.registry.insert(block, destructor, owner, location);
        tracing::trace!(?address, size, ?owner, "block allocated");
        Ok(address)
    }

    /// Destroys `block` and, first, everything it transitively owns.
    ///
    /// Each destructor runs exactly once, children before their owner and
    /// newer siblings before older ones. A failing destructor raises
    /// [`Status::DestructorFailed`] but the teardown continues. Returns `true`
    /// only if every destructor succeeded.
    ///
    /// An address that is not live raises [`Status::ItemDoesNotExist`] and
    /// returns `false`.
    pub fn destroy_block(&mut self, block: Address) -> bool {
        if !self.registry.contains(block) {
            crate::raise!(
                self,
                Status::ItemDoesNotExist,
                "{block:?} is not a live allocation"
            );
            return false;
        }
        self.destroy_subtree(block)
    }

    /// Post-order walk over the owner links, without auxiliary storage.
    fn destroy_subtree(&mut self, root: Address) -> bool {
        let mut succeeded = true;
        let mut current = root;
        loop {
            if !self.registry.contains(current) {
                break;
            }
            if let Some(child) = self.registry.last_child(current) {
                current = child;
                continue;
            }
            if let Some((destructor, location)) = self.registry.take_destructor(current) {
                if !destructor.run(self, current) {
                    succeeded = false;
                    tracing::warn!(
                        block = ?current,
                        file = %location.file,
                        line = location.line,
                        "destructor reported failure"
                    );
                    crate::raise!(
                        self,
                        Status::DestructorFailed,
                        "Destructor returned false, indicating failure (block allocated at {}:{})",
                        location.file,
                        location.line
                    );
                }
                // The destructor may have attached or removed blocks.
                continue;
            }
            let Some(record) = self.registry.detach(current) else {
                break;
            };
            tracing::trace!(block = ?current, "block destroyed");
            match record.owner() {
                Owner::Block(parent) if current != root => current = parent,
                _ => break,
            }
        }
        succeeded
    }

    /// Resizes a live block, keeping its contents, destructor, owner and
    /// children. Bytes past the old size read as zero.
    ///
    /// The block may move; the returned address replaces the old one
    /// everywhere, including in the owner links of its children.
    ///
    /// # Errors
    ///
    /// - [`AllocError::UnknownBlock`] if `block` is not live.
    ///   [`Status::ItemDoesNotExist`] is raised.
    /// - [`AllocError::OutOfMemory`] if the new size cannot be reserved. The
    ///   block is left as it was and [`Status::OutOfMemory`] is raised.
    pub fn reallocate(&mut self, block: Address, new_size: usize) -> Result<Address, AllocError> {
        match self.registry.resize(block, new_size) {
            Ok(Some(address)) => {
                tracing::trace!(from = ?block, to = ?address, new_size, "block resized");
                Ok(address)
            }
            Ok(None) => {
                crate::raise!(
                    self,
                    Status::ItemDoesNotExist,
                    "{block:?} is not a live allocation"
                );
                Err(AllocError::UnknownBlock(block))
            }
            Err(error) => {
                crate::raise!(
                    self,
                    Status::OutOfMemory,
                    "Failed to resize {block:?} to {new_size} bytes"
                );
                Err(error.into())
            }
        }
    }

    /// Moves `block` under a new owner.
    ///
    /// Fails, raising [`Status::ItemDoesNotExist`], if either side is not
    /// live, and raising [`Status::InvalidArgument`] if `block` would end up
    /// owning itself.
    pub fn set_owner(&mut self, block: Address, owner: Owner) -> bool {
        if !self.registry.contains(block) {
            crate::raise!(self, Status::ItemDoesNotExist, "{block:?} is not a live allocation");
            return false;
        }
        if !self.registry.owner_exists(owner) {
            crate::raise!(self, Status::ItemDoesNotExist, "Owner {owner:?} is not a live allocation");
            return false;
        }
        if self.registry.would_cycle(block, owner) {
            crate::raise!(
                self,
                Status::InvalidArgument,
                "Making {owner:?} the owner of {block:?} would create an ownership cycle"
            );
            return false;
        }
        self.registry.reparent(block, owner);
        true
    }

    /// Installs, replaces or (with `None`) removes the destructor of a live
    /// block.
    ///
    /// Returns `false`, raising [`Status::ItemDoesNotExist`], if `block` is
    /// not live. A replaced destructor is dropped without running.
    pub fn set_destructor(&mut self, block: Address, destructor: Option<Destructor>) -> bool {
        if self.registry.set_destructor(block, destructor).is_none() {
            crate::raise!(self, Status::ItemDoesNotExist, "{block:?} is not a live allocation");
            return false;
        }
        true
    }

    /// Returns `true` if `block` is a live allocation of this context.
    #[inline]
    pub fn contains(&self, block: Address) -> bool {
        self.registry.contains(block)
    }

    /// The size `block` was requested with.
    pub fn size_of(&self, block: Address) -> Option<usize> {
        self.registry.size_of(block)
    }

    /// The owner of `block`.
    pub fn owner_of(&self, block: Address) -> Option<Owner> {
        self.registry.get(block).map(|record| record.owner())
    }

    /// The contents of `block`.
    pub fn block(&self, block: Address) -> Option<&[u8]> {
        self.registry.block(block)
    }

    /// The contents of `block`, mutably.
    pub fn block_mut(&mut self, block: Address) -> Option<&mut [u8]> {
        self.registry.block_mut(block)
    }

    /// Iterates over every live block, in no particular order.
    pub fn allocations(&self) -> impl Iterator<Item = AllocationInfo<'_>> + '_ {
        self.registry.allocations()
    }

    /// Running totals for this context's blocks.
    #[inline]
    pub fn memory_stats(&self) -> MemoryStats {
        self.registry.stats()
    }

    /// Raises an error.
    ///
    /// If no error is live this becomes the root cause and fixes the status
    /// and message. Either way `frame` is appended to the call path, unless
    /// the path already holds [`max_frames`](ContextConfig::max_frames)
    /// frames. Raising [`Status::NoError`] stores [`Status::Other`].
    ///
    /// Most code uses the [`raise!`](crate::raise) macro, which fills in the
    /// frame from the call site.
    pub fn raise(&mut self, status: Status, frame: Frame, message: Option<fmt::Arguments<'_>>) {
        self.diagnostics.raise(status, frame, message);
    }

    /// Appends a frame to the live error's call path.
    ///
    /// Returns `false` if no error is live or the frame was dropped because
    /// the path is full.
    pub fn add_to_callstack(&mut self, frame: Frame) -> bool {
        self.diagnostics.push_frame(frame)
    }

    /// Returns `true` if an error is live.
    #[inline]
    pub fn has_error(&self) -> bool {
        self.diagnostics.is_set()
    }

    /// The live error's status, or [`Status::NoError`].
    #[inline]
    pub fn status(&self) -> Status {
        self.diagnostics.state().status()
    }

    /// The numeric code of [`status`](Context::status).
    #[inline]
    pub fn error_code(&self) -> i32 {
        self.status().code()
    }

    /// The live error, if any.
    #[inline]
    pub fn error(&self) -> Option<&RaisedError> {
        self.diagnostics.state().raised()
    }

    /// The error channel.
    #[inline]
    pub fn error_state(&self) -> &ErrorState {
        self.diagnostics.state()
    }

    /// Discards the live error so the context can be reused.
    pub fn clear_error(&mut self) {
        self.diagnostics.clear();
    }

    /// A [`Display`](fmt::Display) rendering of the error channel.
    ///
    /// With `full_paths` unset, files are shown by their last path component.
    #[inline]
    pub fn error_report(&self, full_paths: bool) -> ErrorReport<'_> {
        ErrorReport::new(self.diagnostics.state(), full_paths)
    }

    /// Renders the [error report](Context::error_report) into `buffer`, with
    /// the guarantees of [`format_bounded`].
    pub fn render_error(&self, buffer: &mut [u8], full_paths: bool) -> Result<usize, crate::FormatError> {
        format_bounded(buffer, format_args!("{}", self.error_report(full_paths)))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            tracing::debug!(
                blocks = self.registry.len(),
                "context dropped with live blocks"
            );
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.state)
            .field("status", &self.status())
            .field("memory", &self.memory_stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use alloc::{rc::Rc, vec::Vec};
    use core::cell::RefCell;

    use super::*;

    static_assertions::assert_not_impl_any!(Context: Send, Sync);
    static_assertions::assert_not_impl_any!(Address: Send, Sync);
    static_assertions::assert_impl_all!(ContextState: Send, Sync, Copy);

    fn recording(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Option<Destructor> {
        let log = Rc::clone(log);
        Some(Destructor::new(move |_, _| {
            log.borrow_mut().push(name);
            true
        }))
    }

    #[test]
    fn test_post_order_newest_sibling_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut context = Context::try_new().unwrap();
        let root = context.allocate(1, recording(&log, "root"), Owner::Context).unwrap();
        let a = context.allocate(1, recording(&log, "a"), Owner::Block(root)).unwrap();
        context.allocate(1, recording(&log, "a1"), Owner::Block(a)).unwrap();
        context.allocate(1, recording(&log, "b"), Owner::Block(root)).unwrap();

        assert!(context.destroy_block(root));
        assert_eq!(*log.borrow(), ["b", "a1", "a", "root"]);
        assert_eq!(context.memory_stats().live_blocks, 0);
    }

    #[test]
    fn test_destructor_sees_its_block() {
        let mut context = Context::try_new().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let block = context
            .allocate(
                3,
                Some(Destructor::new(move |context, block| {
                    sink.borrow_mut().extend_from_slice(context.block(block).unwrap_or_default());
                    true
                })),
                Owner::Context,
            )
            .unwrap();
        context.block_mut(block).unwrap().copy_from_slice(b"abc");

        assert!(context.destroy_block(block));
        assert_eq!(*seen.borrow(), b"abc");
    }

    #[test]
    fn test_destructor_may_allocate_during_teardown() {
        let mut context = Context::try_new().unwrap();
        let block = context
            .allocate(
                1,
                Some(Destructor::new(|context, block| {
                    context.allocate(1, None, Owner::Block(block)).is_ok()
                })),
                Owner::Context,
            )
            .unwrap();

        assert!(context.destroy_block(block));
        assert_eq!(context.memory_stats().live_blocks, 0);
    }

    #[test]
    fn test_unknown_block_is_reported() {
        let mut context = Context::try_new().unwrap();
        let block = context.allocate_owned_by_context(1).unwrap();
        assert!(context.destroy_block(block));

        assert!(!context.destroy_block(block));
        assert_eq!(context.status(), Status::ItemDoesNotExist);
        context.clear_error();

        assert!(!context.set_destructor(block, None));
        assert_eq!(context.status(), Status::ItemDoesNotExist);
    }

    #[test]
    fn test_stale_address_names_whichever_block_now_lives_there() {
        let mut context = Context::try_new().unwrap();
        let stale = context.allocate_owned_by_context(48).unwrap();
        assert!(context.destroy_block(stale));
        assert!(!context.contains(stale));

        let newer = context.allocate_owned_by_context(16).unwrap();
        if newer == stale {
            // Reused address: the old handle now reaches the newer block.
            assert!(context.contains(stale));
            assert_eq!(context.size_of(stale), Some(16));
        } else {
            assert!(!context.contains(stale));
            assert_eq!(context.size_of(stale), None);
        }
        assert!(!context.has_error());
    }

    #[test]
    fn test_debug_output() {
        let context = Context::try_new().unwrap();
        let debug = alloc::format!("{context:?}");
        assert!(debug.starts_with("Context { state: Active, status: NoError"));
    }
}
