#![forbid(unsafe_code)]

//! Buffer groups.
//!
//! A [`BufferGroup`] aggregates member buffers: it is buffering while any
//! member is, and `commit`/`flush` fan out to the members in insertion order.
//! A group is itself a [`Buffer`], so groups nest.
//!
//! # Failure Modes
//!
//! - A member fails during `commit`/`flush`: iteration stops and the error
//!   propagates. Members before it have already been committed or flushed;
//!   there is no rollback.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashSet;
use bindery_core::{ChangeEmitter, PropertyChange, Subscription};

use crate::buffer::{AsBuffer, BUFFERING, Buffer, BufferId};
use crate::error::BindingError;

/// Options for a [`BufferGroup`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferGroupConfig {
    /// Only commit or flush members that are currently buffering.
    pub skip_non_buffering: bool,
}

struct Member {
    buffer: Rc<dyn Buffer>,
    _sub: Subscription,
}

struct GroupState {
    members: Vec<Member>,
    dirty: AHashSet<BufferId>,
    buffering: bool,
}

struct GroupInner {
    id: BufferId,
    config: BufferGroupConfig,
    state: RefCell<GroupState>,
    changes: ChangeEmitter<PropertyChange<bool>>,
}

/// An ordered set of buffers committed and flushed together.
///
/// Cloning yields another handle to the same group.
#[derive(Clone)]
pub struct BufferGroup {
    inner: Rc<GroupInner>,
}

impl fmt::Debug for BufferGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("BufferGroup")
            .field("id", &self.inner.id)
            .field("members", &state.members.len())
            .field("dirty", &state.dirty.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for BufferGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BufferGroupConfig::default())
    }

    #[must_use]
    pub fn with_config(config: BufferGroupConfig) -> Self {
        Self {
            inner: Rc::new(GroupInner {
                id: BufferId::next(),
                config,
                state: RefCell::new(GroupState {
                    members: Vec::new(),
                    dirty: AHashSet::new(),
                    buffering: false,
                }),
                changes: ChangeEmitter::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> BufferGroupConfig {
        self.inner.config
    }

    /// Add a buffer. See [`BufferGroup::add_shared`].
    pub fn add(&self, buffer: impl Buffer + 'static) -> bool {
        self.add_shared(Rc::new(buffer))
    }

    /// Add a shared buffer handle.
    ///
    /// Returns `false` if the buffer is already a member or is this group.
    pub fn add_shared(&self, buffer: Rc<dyn Buffer>) -> bool {
        let id = buffer.buffer_id();
        if id == self.inner.id || self.contains(id) {
            return false;
        }
        let weak = Rc::downgrade(&self.inner);
        let sub = buffer.subscribe_buffering(Box::new(move |change: &PropertyChange<bool>| {
            if let Some(inner) = weak.upgrade() {
                BufferGroup { inner }.member_changed(id, change.new);
            }
        }));
        let buffering = buffer.is_buffering();
        {
            let mut state = self.inner.state.borrow_mut();
            state.members.push(Member { buffer, _sub: sub });
            if buffering {
                state.dirty.insert(id);
            }
        }
        tracing::debug!(group = %self.inner.id, member = %id, "buffer added to group");
        self.recompute();
        true
    }

    /// Remove a member. Returns whether it was present.
    pub fn remove(&self, buffer: &dyn Buffer) -> bool {
        self.remove_id(buffer.buffer_id())
    }

    pub fn remove_id(&self, id: BufferId) -> bool {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let Some(index) = state.members.iter().position(|m| m.buffer.buffer_id() == id)
            else {
                return false;
            };
            state.dirty.remove(&id);
            state.members.remove(index)
        };
        drop(removed);
        tracing::debug!(group = %self.inner.id, member = %id, "buffer removed from group");
        self.recompute();
        true
    }

    #[must_use]
    pub fn contains(&self, id: BufferId) -> bool {
        self.inner
            .state
            .borrow()
            .members
            .iter()
            .any(|m| m.buffer.buffer_id() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.borrow().members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of members currently buffering.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.inner.state.borrow().dirty.len()
    }

    pub fn subscribe(&self, callback: impl Fn(&PropertyChange<bool>) + 'static) -> Subscription {
        self.inner.changes.subscribe(callback)
    }

    fn member_changed(&self, id: BufferId, buffering: bool) {
        {
            let mut state = self.inner.state.borrow_mut();
            if !state.members.iter().any(|m| m.buffer.buffer_id() == id) {
                return;
            }
            if buffering {
                state.dirty.insert(id);
            } else {
                state.dirty.remove(&id);
            }
        }
        self.recompute();
    }

    fn recompute(&self) {
        let flipped = {
            let mut state = self.inner.state.borrow_mut();
            let now = !state.dirty.is_empty();
            let was = std::mem::replace(&mut state.buffering, now);
            (was != now).then_some(now)
        };
        if let Some(now) = flipped {
            self.inner.changes.notify(BUFFERING, !now, now);
        }
    }

    /// Members the next commit/flush should visit, in insertion order.
    fn targets(&self) -> Vec<Rc<dyn Buffer>> {
        let state = self.inner.state.borrow();
        state
            .members
            .iter()
            .filter(|m| !self.inner.config.skip_non_buffering || m.buffer.is_buffering())
            .map(|m| Rc::clone(&m.buffer))
            .collect()
    }
}

impl Buffer for BufferGroup {
    fn buffer_id(&self) -> BufferId {
        self.inner.id
    }

    fn is_buffering(&self) -> bool {
        self.inner.state.borrow().buffering
    }

    fn commit(&self) -> Result<(), BindingError> {
        let targets = self.targets();
        tracing::debug!(group = %self.inner.id, members = targets.len(), "group commit");
        for buffer in targets {
            buffer.commit()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), BindingError> {
        let targets = self.targets();
        tracing::debug!(group = %self.inner.id, members = targets.len(), "group flush");
        for buffer in targets {
            buffer.flush()?;
        }
        Ok(())
    }

    fn subscribe_buffering(&self, listener: Box<dyn Fn(&PropertyChange<bool>)>) -> Subscription {
        self.inner.changes.subscribe_boxed(listener)
    }
}

impl AsBuffer for BufferGroup {
    fn as_buffer(&self) -> Option<Rc<dyn Buffer>> {
        Some(Rc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferedBinding;
    use crate::value::{Binding, ValueModel};
    use std::cell::Cell;

    fn field(initial: i32) -> (Binding<i32>, BufferedBinding<i32>) {
        let source = Binding::new(initial);
        let buffer = BufferedBinding::new(source.clone().into_source());
        (source, buffer)
    }

    fn flag_log(group: &BufferGroup) -> (Rc<RefCell<Vec<bool>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = group.subscribe(move |c| l.borrow_mut().push(c.new));
        (log, sub)
    }

    #[test]
    fn buffering_is_any_member() {
        let (_s1, b1) = field(1);
        let (_s2, b2) = field(2);
        let group = BufferGroup::new();
        group.add(b1.clone());
        group.add(b2.clone());
        let (log, _sub) = flag_log(&group);

        b1.set_value(Some(10)).unwrap();
        b2.set_value(Some(20)).unwrap();
        assert!(group.is_buffering());
        assert_eq!(group.dirty_count(), 2);

        b1.set_value(Some(1)).unwrap();
        assert!(group.is_buffering());
        b2.set_value(Some(2)).unwrap();
        assert!(!group.is_buffering());

        assert_eq!(*log.borrow(), vec![true, false]);
    }

    #[test]
    fn commit_fans_out_in_order() {
        let (s1, b1) = field(1);
        let (s2, b2) = field(2);
        let group = BufferGroup::new();
        group.add(b1.clone());
        group.add(b2.clone());
        b1.set_value(Some(11)).unwrap();
        b2.set_value(Some(22)).unwrap();

        group.commit().unwrap();
        assert_eq!((s1.get(), s2.get()), (Some(11), Some(22)));
        assert!(!group.is_buffering());
    }

    #[test]
    fn flush_discards_all_edits() {
        let (_s1, b1) = field(1);
        let group = BufferGroup::new();
        group.add(b1.clone());
        b1.set_value(Some(5)).unwrap();
        group.flush().unwrap();
        assert_eq!(b1.value(), Some(1));
        assert!(!group.is_buffering());
    }

    #[test]
    fn failure_mid_commit_leaves_earlier_members_committed() {
        let (s1, b1) = field(1);
        let (s2, b2) = field(2);
        let (s3, b3) = field(3);
        let group = BufferGroup::new();
        group.add(b1.clone());
        group.add(b2.clone());
        group.add(b3.clone());
        b1.set_value(Some(10)).unwrap();
        b2.set_value(None).unwrap();
        b3.set_value(Some(30)).unwrap();

        assert!(group.commit().is_err());
        assert_eq!(s1.get(), Some(10));
        assert_eq!(s2.get(), Some(2));
        assert_eq!(s3.get(), Some(3));
        assert!(group.is_buffering());
    }

    #[test]
    fn skip_non_buffering_leaves_clean_members_alone() {
        let (_s1, b1) = field(1);
        let (_s2, b2) = field(2);
        let group = BufferGroup::with_config(BufferGroupConfig {
            skip_non_buffering: true,
        });
        group.add(b1.clone());
        group.add(b2.clone());

        let resets = Rc::new(Cell::new(0));
        let r = Rc::clone(&resets);
        let _sub = b2.subscribe(move |_| r.set(r.get() + 1));
        b1.set_value(Some(9)).unwrap();
        group.commit().unwrap();
        assert_eq!(resets.get(), 0, "clean member was not committed");
    }

    #[test]
    fn duplicates_and_self_are_rejected() {
        let (_s, b) = field(1);
        let group = BufferGroup::new();
        let shared: Rc<dyn Buffer> = Rc::new(b.clone());
        assert!(group.add_shared(Rc::clone(&shared)));
        assert!(!group.add(b.clone()));
        assert!(!group.add(group.clone()));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn removed_member_is_ignored() {
        let (_s, b) = field(1);
        let group = BufferGroup::new();
        group.add(b.clone());
        assert!(group.remove(&b));
        assert!(!group.remove(&b));
        b.set_value(Some(2)).unwrap();
        assert!(!group.is_buffering());
        assert!(group.is_empty());
    }

    #[test]
    fn removing_dirty_member_clears_flag() {
        let (_s, b) = field(1);
        let group = BufferGroup::new();
        group.add(b.clone());
        b.set_value(Some(2)).unwrap();
        let (log, _sub) = flag_log(&group);
        group.remove(&b);
        assert_eq!(*log.borrow(), vec![false]);
    }

    #[test]
    fn removing_only_dirty_member_of_three_clears_flag() {
        let (_sa, a) = field(1);
        let (_sb, b) = field(2);
        let (_sc, c) = field(3);
        let group = BufferGroup::new();
        group.add(a.clone());
        group.add(b.clone());
        group.add(c.clone());
        b.set_value(Some(20)).unwrap();
        assert!(group.is_buffering());

        let (log, _sub) = flag_log(&group);
        group.remove(&b);
        assert_eq!(*log.borrow(), vec![false]);
        assert!(!group.is_buffering());
        assert_eq!(group.len(), 2);

        b.set_value(Some(21)).unwrap();
        assert!(!group.is_buffering());
        assert_eq!(*log.borrow(), vec![false]);
    }

    #[test]
    fn adding_dirty_member_sets_flag() {
        let (_s, b) = field(1);
        b.set_value(Some(3)).unwrap();
        let group = BufferGroup::new();
        group.add(b);
        assert!(group.is_buffering());
    }

    #[test]
    fn groups_nest() {
        let (s1, b1) = field(1);
        let inner = BufferGroup::new();
        inner.add(b1.clone());
        let outer = BufferGroup::new();
        outer.add(inner.clone());

        b1.set_value(Some(4)).unwrap();
        assert!(outer.is_buffering());
        outer.commit().unwrap();
        assert_eq!(s1.get(), Some(4));
        assert!(!outer.is_buffering());
    }
}
