#![forbid(unsafe_code)]

//! The presentation model: one screen's validation state and edit buffer.
//!
//! A [`PresentationModel`] owns a [`BufferGroup`] for every buffered binding
//! added to it and aggregates the validation events of its adapters into a
//! per-subject message map.
//!
//! # Invariants
//!
//! 1. An event for subject `X` replaces all of `X`'s messages; it never
//!    merges with them.
//! 2. `error_count` and `warning_count` are recomputed from the whole map
//!    after every event, and notify only when they change.
//! 3. `valid` notifies only when `error_count` crosses zero.
//! 4. `commit_data` commits nothing unless the model is valid after the
//!    validation pass; a blocked commit leaves every buffer untouched.
//!
//! # Failure Modes
//!
//! - A buffer fails during a permitted commit: the error propagates.
//!   Buffers before it in the group are already committed.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use bindery_binding::{AsBuffer, Binding, BindingError, Buffer, BufferGroup, BufferGroupConfig};
use bindery_core::{ChangeEmitter, PropertyChange, Subscription};
use bindery_validation::{Message, MessageSet, SubjectId, ValidationChange, count_by_severity};

use crate::adapter::ValidationAdapter;
use crate::config::ModelConfig;

/// Property names carried by model notifications.
pub const ERROR_COUNT: &str = "errorCount";
pub const WARNING_COUNT: &str = "warningCount";
pub const VALID: &str = "valid";

struct AdapterEntry {
    adapter: Rc<dyn ValidationAdapter>,
    _sub: Subscription,
}

#[derive(Default)]
struct ModelState {
    bindings: Vec<Rc<dyn AsBuffer>>,
    adapters: Vec<AdapterEntry>,
    messages: AHashMap<SubjectId, MessageSet>,
    error_count: usize,
    warning_count: usize,
}

struct ModelInner {
    config: ModelConfig,
    group: BufferGroup,
    state: RefCell<ModelState>,
    error_count_changes: ChangeEmitter<PropertyChange<usize>>,
    warning_count_changes: ChangeEmitter<PropertyChange<usize>>,
    valid_changes: ChangeEmitter<PropertyChange<bool>>,
    error_count_binding: OnceCell<Binding<usize>>,
    warning_count_binding: OnceCell<Binding<usize>>,
    valid_binding: OnceCell<Binding<bool>>,
}

/// Single point of truth for whether a screen's data is valid and edited.
///
/// Cloning yields another handle to the same model.
#[derive(Clone)]
pub struct PresentationModel {
    inner: Rc<ModelInner>,
}

impl fmt::Debug for PresentationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("PresentationModel")
            .field("bindings", &state.bindings.len())
            .field("adapters", &state.adapters.len())
            .field("error_count", &state.error_count)
            .field("warning_count", &state.warning_count)
            .field("group", &self.inner.group)
            .finish()
    }
}

impl Default for PresentationModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationModel {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ModelConfig) -> Self {
        let group = BufferGroup::with_config(BufferGroupConfig {
            skip_non_buffering: config.skip_non_buffering,
        });
        Self {
            inner: Rc::new(ModelInner {
                config,
                group,
                state: RefCell::new(ModelState::default()),
                error_count_changes: ChangeEmitter::new(),
                warning_count_changes: ChangeEmitter::new(),
                valid_changes: ChangeEmitter::new(),
                error_count_binding: OnceCell::new(),
                warning_count_binding: OnceCell::new(),
                valid_binding: OnceCell::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> ModelConfig {
        self.inner.config
    }

    /// The buffer group commit and flush go through.
    #[must_use]
    pub fn buffer_group(&self) -> &BufferGroup {
        &self.inner.group
    }

    /// Add a binding; buffers join the model's group.
    ///
    /// Returns whether the binding was registered as a buffer.
    pub fn add(&self, binding: impl AsBuffer + 'static) -> bool {
        let registered = binding
            .as_buffer()
            .is_some_and(|buffer| self.inner.group.add_shared(buffer));
        self.inner.state.borrow_mut().bindings.push(Rc::new(binding));
        registered
    }

    /// Add an adapter and start aggregating its validation events.
    pub fn add_adapter(&self, adapter: impl ValidationAdapter + 'static) {
        self.add_shared_adapter(Rc::new(adapter));
    }

    pub fn add_shared_adapter(&self, adapter: Rc<dyn ValidationAdapter>) {
        let weak = Rc::downgrade(&self.inner);
        let sub = adapter.subscribe_validation(Box::new(move |change: &ValidationChange| {
            if let Some(inner) = weak.upgrade() {
                PresentationModel { inner }.validation_changed(change.subject, &change.messages);
            }
        }));
        let subject = adapter.subject();
        let current = adapter.messages();
        self.inner.state.borrow_mut().adapters.push(AdapterEntry {
            adapter,
            _sub: sub,
        });
        tracing::debug!(%subject, "adapter added to model");
        if !current.is_empty() {
            self.validation_changed(subject, &current);
        }
    }

    #[must_use]
    pub fn adapter_count(&self) -> usize {
        self.inner.state.borrow().adapters.len()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.inner.state.borrow().error_count
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.inner.state.borrow().warning_count
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    /// Whether any added buffer holds edits.
    #[must_use]
    pub fn is_buffering(&self) -> bool {
        self.inner.group.is_buffering()
    }

    /// All current messages, one entry per subject and message, ordered by
    /// subject. Equal messages from different subjects stay distinct, so the
    /// entries always agree with the counts.
    #[must_use]
    pub fn validation_messages(&self) -> Vec<(SubjectId, Message)> {
        let state = self.inner.state.borrow();
        let mut entries: Vec<(SubjectId, Message)> = state
            .messages
            .iter()
            .flat_map(|(subject, set)| set.iter().map(move |m| (*subject, m.clone())))
            .collect();
        entries.sort();
        entries
    }

    /// Current messages of one subject.
    #[must_use]
    pub fn messages_for(&self, subject: SubjectId) -> MessageSet {
        self.inner
            .state
            .borrow()
            .messages
            .get(&subject)
            .cloned()
            .unwrap_or_default()
    }

    pub fn subscribe_error_count(
        &self,
        callback: impl Fn(&PropertyChange<usize>) + 'static,
    ) -> Subscription {
        self.inner.error_count_changes.subscribe(callback)
    }

    pub fn subscribe_warning_count(
        &self,
        callback: impl Fn(&PropertyChange<usize>) + 'static,
    ) -> Subscription {
        self.inner.warning_count_changes.subscribe(callback)
    }

    pub fn subscribe_valid(&self, callback: impl Fn(&PropertyChange<bool>) + 'static) -> Subscription {
        self.inner.valid_changes.subscribe(callback)
    }

    pub fn subscribe_buffering(
        &self,
        callback: impl Fn(&PropertyChange<bool>) + 'static,
    ) -> Subscription {
        self.inner.group.subscribe(callback)
    }

    /// A binding that tracks `error_count`, created on first use.
    ///
    /// The model overwrites it on every count change; writes made through it
    /// do not feed back into the model.
    pub fn error_count_binding(&self) -> Binding<usize> {
        self.inner
            .error_count_binding
            .get_or_init(|| Binding::new(self.error_count()))
            .clone()
    }

    /// A binding that tracks `warning_count`, created on first use.
    pub fn warning_count_binding(&self) -> Binding<usize> {
        self.inner
            .warning_count_binding
            .get_or_init(|| Binding::new(self.warning_count()))
            .clone()
    }

    /// A binding that tracks `is_valid`, created on first use.
    pub fn valid_binding(&self) -> Binding<bool> {
        self.inner
            .valid_binding
            .get_or_init(|| Binding::new(self.is_valid()))
            .clone()
    }

    /// Validate, then commit every buffer if and only if the model is valid.
    ///
    /// Returns `Ok(false)` when commit was blocked by errors.
    pub fn commit_data(&self) -> Result<bool, BindingError> {
        if self.inner.config.validate_before_commit {
            for adapter in self.adapters() {
                adapter.validate()?;
            }
        }
        let errors = self.error_count();
        if errors > 0 {
            tracing::info!(errors, "commit blocked by {errors} errors");
            return Ok(false);
        }
        self.inner.group.commit()?;
        tracing::info!("committed");
        Ok(true)
    }

    /// Discard every edit regardless of validity.
    pub fn flush_data(&self) -> Result<(), BindingError> {
        tracing::debug!("flushing model");
        self.inner.group.flush()
    }

    /// Run every adapter's validation pass.
    pub fn validate(&self) -> Result<(), BindingError> {
        for adapter in self.adapters() {
            adapter.validate()?;
        }
        Ok(())
    }

    fn adapters(&self) -> Vec<Rc<dyn ValidationAdapter>> {
        self.inner
            .state
            .borrow()
            .adapters
            .iter()
            .map(|entry| Rc::clone(&entry.adapter))
            .collect()
    }

    fn validation_changed(&self, subject: SubjectId, messages: &MessageSet) {
        let (errors, warnings) = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            if messages.is_empty() {
                state.messages.remove(&subject);
            } else {
                state.messages.insert(subject, messages.clone());
            }
            let (errors, warnings) =
                count_by_severity(state.messages.values().flat_map(|set| set.iter()));
            let old_errors = std::mem::replace(&mut state.error_count, errors);
            let old_warnings = std::mem::replace(&mut state.warning_count, warnings);
            ((old_errors, errors), (old_warnings, warnings))
        };
        self.publish_counts(errors, warnings);
    }

    fn publish_counts(&self, errors: (usize, usize), warnings: (usize, usize)) {
        let (old_errors, new_errors) = errors;
        let (old_warnings, new_warnings) = warnings;

        if old_errors != new_errors {
            tracing::debug!(old = old_errors, new = new_errors, "error count changed");
            self.inner
                .error_count_changes
                .notify(ERROR_COUNT, old_errors, new_errors);
            if let Some(binding) = self.inner.error_count_binding.get() {
                mirror(binding, new_errors);
            }
        }
        if old_warnings != new_warnings {
            tracing::debug!(old = old_warnings, new = new_warnings, "warning count changed");
            self.inner
                .warning_count_changes
                .notify(WARNING_COUNT, old_warnings, new_warnings);
            if let Some(binding) = self.inner.warning_count_binding.get() {
                mirror(binding, new_warnings);
            }
        }
        let was_valid = old_errors == 0;
        let is_valid = new_errors == 0;
        if was_valid != is_valid {
            tracing::debug!(valid = is_valid, "model validity changed");
            self.inner.valid_changes.notify(VALID, was_valid, is_valid);
            if let Some(binding) = self.inner.valid_binding.get() {
                mirror(binding, is_valid);
            }
        }
    }
}

fn mirror<T: Clone + PartialEq + 'static>(binding: &Binding<T>, value: T) {
    if let Err(err) = binding.set(value) {
        tracing::warn!(error = %err, "count binding rejected update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::BindingAdapter;
    use bindery_binding::{BufferedBinding, ValueModel};
    use bindery_validation::{Message, Range};
    use proptest::prelude::*;
    use std::cell::Cell;
    use tracing_test::traced_test;

    fn single(message: Message) -> MessageSet {
        MessageSet::from([message])
    }

    fn counter<T: Copy + 'static>(
        subscribe: impl FnOnce(Box<dyn Fn(&PropertyChange<T>)>) -> Subscription,
    ) -> (Rc<RefCell<Vec<T>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = subscribe(Box::new(move |c| l.borrow_mut().push(c.new)));
        (log, sub)
    }

    fn manual() -> BindingAdapter<i32> {
        BindingAdapter::new(Binding::new(0).into_source())
    }

    #[test]
    fn events_replace_per_subject() {
        let model = PresentationModel::new();
        let a = manual();
        let b = manual();
        model.add_adapter(a.clone());
        model.add_adapter(b.clone());

        a.report([Message::error("a1"), Message::error("a2")].into());
        b.report(single(Message::warning("b1")));
        assert_eq!((model.error_count(), model.warning_count()), (2, 1));

        a.report(single(Message::warning("a3")));
        assert_eq!((model.error_count(), model.warning_count()), (0, 2));
        assert_eq!(model.messages_for(a.subject()), single(Message::warning("a3")));
        assert_eq!(model.validation_messages().len(), 2);
    }

    #[test]
    fn equal_messages_from_different_subjects_are_listed_separately() {
        let model = PresentationModel::new();
        let a = manual();
        let b = manual();
        model.add_adapter(a.clone());
        model.add_adapter(b.clone());

        a.report(single(Message::error("required")));
        b.report(single(Message::error("required")));
        assert_eq!(model.error_count(), 2);

        let mut expected = vec![
            (a.subject(), Message::error("required")),
            (b.subject(), Message::error("required")),
        ];
        expected.sort();
        assert_eq!(model.validation_messages(), expected);
    }

    #[test]
    fn counts_notify_only_on_change() {
        let model = PresentationModel::new();
        let a = manual();
        model.add_adapter(a.clone());
        let (errors, _s1) = counter(|cb| model.subscribe_error_count(cb));
        let (valid, _s2) = counter(|cb| model.subscribe_valid(cb));

        a.report(single(Message::error("x")));
        a.report([Message::error("y")].into());
        a.report([Message::error("y"), Message::error("z")].into());
        a.report(MessageSet::new());

        assert_eq!(*errors.borrow(), vec![1, 2, 0]);
        assert_eq!(*valid.borrow(), vec![false, true]);
    }

    #[test]
    fn count_bindings_are_lazy_and_mirror() {
        let model = PresentationModel::new();
        let a = manual();
        model.add_adapter(a.clone());
        a.report(single(Message::error("early")));

        let errors = model.error_count_binding();
        let valid = model.valid_binding();
        let warnings = model.warning_count_binding();
        assert_eq!(errors.get(), Some(1));
        assert_eq!(valid.get(), Some(false));
        assert_eq!(warnings.get(), Some(0));

        a.report(single(Message::warning("late")));
        assert_eq!(errors.get(), Some(0));
        assert_eq!(valid.get(), Some(true));
        assert_eq!(warnings.get(), Some(1));
    }

    #[test]
    fn adapter_with_existing_messages_is_counted() {
        let a = manual();
        a.report(single(Message::error("pre")));
        let model = PresentationModel::new();
        model.add_adapter(a);
        assert_eq!(model.error_count(), 1);
    }

    #[test]
    fn add_registers_buffers_only() {
        let model = PresentationModel::new();
        let plain = Binding::new(1);
        let buffer = BufferedBinding::new(plain.clone().into_source());
        assert!(!model.add(plain));
        assert!(model.add(buffer.clone()));
        assert_eq!(model.buffer_group().len(), 1);

        buffer.set_value(Some(2)).unwrap();
        assert!(model.is_buffering());
    }

    #[traced_test]
    #[test]
    fn commit_is_gated_on_validity() {
        let model = PresentationModel::new();
        let source = Binding::new(1);
        let buffer = BufferedBinding::new(source.clone().into_source());
        model.add(buffer.clone());
        let adapter =
            BindingAdapter::with_validator(buffer.clone().into_source(), Rc::new(Range::at_most(5)));
        model.add_adapter(adapter);

        buffer.set_value(Some(9)).unwrap();
        assert_eq!(model.commit_data(), Ok(false));
        assert_eq!(source.get(), Some(1));
        assert!(model.is_buffering());
        assert!(logs_contain("commit blocked by 1 errors"));

        buffer.set_value(Some(4)).unwrap();
        assert_eq!(model.commit_data(), Ok(true));
        assert_eq!(source.get(), Some(4));
        assert!(!model.is_buffering());
        assert!(model.is_valid());
    }

    #[test]
    fn commit_without_validation_pass_uses_current_state() {
        let model = PresentationModel::with_config(ModelConfig {
            validate_before_commit: false,
            ..ModelConfig::default()
        });
        let source = Binding::new(1);
        let buffer = BufferedBinding::new(source.clone().into_source());
        model.add(buffer.clone());
        let adapter =
            BindingAdapter::with_validator(buffer.clone().into_source(), Rc::new(Range::at_most(5)));
        model.add_adapter(adapter.clone());

        buffer.set_value(Some(9)).unwrap();
        assert_eq!(model.commit_data(), Ok(true), "no pass ran, model still valid");
        assert_eq!(source.get(), Some(9));

        adapter.validate().unwrap();
        assert_eq!(model.commit_data(), Ok(false));
    }

    #[test]
    fn flush_ignores_validity() {
        let model = PresentationModel::new();
        let source = Binding::new(1);
        let buffer = BufferedBinding::new(source.clone().into_source());
        model.add(buffer.clone());
        let a = manual();
        model.add_adapter(a.clone());
        a.report(single(Message::error("blocked")));

        buffer.set_value(Some(3)).unwrap();
        model.flush_data().unwrap();
        assert_eq!(buffer.value(), Some(1));
        assert!(!model.is_valid());
    }

    #[test]
    fn dropped_model_stops_listening() {
        let a = manual();
        let hits = Rc::new(Cell::new(0));
        {
            let model = PresentationModel::new();
            model.add_adapter(a.clone());
            let h = Rc::clone(&hits);
            let _sub = model.subscribe_error_count(move |_| h.set(h.get() + 1));
            a.report(single(Message::error("one")));
        }
        a.report(MessageSet::new());
        assert_eq!(hits.get(), 1);
    }

    fn report_strategy() -> impl Strategy<Value = (usize, Vec<(bool, u8)>)> {
        (
            0..3usize,
            proptest::collection::vec((any::<bool>(), 0..3u8), 0..4),
        )
    }

    proptest! {
        #[test]
        fn counts_match_latest_reports(reports in proptest::collection::vec(report_strategy(), 0..24)) {
            let model = PresentationModel::new();
            let adapters: Vec<_> = (0..3).map(|_| manual()).collect();
            for adapter in &adapters {
                model.add_adapter(adapter.clone());
            }
            let valid_flag = Rc::new(Cell::new(true));
            let v = Rc::clone(&valid_flag);
            let _sub = model.subscribe_valid(move |c| {
                assert_eq!(c.old, v.get());
                v.set(c.new);
            });

            let mut latest: Vec<MessageSet> = vec![MessageSet::new(); 3];
            for (index, messages) in reports {
                let set: MessageSet = messages
                    .into_iter()
                    .map(|(error, n)| {
                        if error {
                            Message::error(format!("e{n}"))
                        } else {
                            Message::warning(format!("w{n}"))
                        }
                    })
                    .collect();
                adapters[index].report(set.clone());
                latest[index] = set;

                let (errors, warnings) = count_by_severity(latest.iter().flat_map(|s| s.iter()));
                prop_assert_eq!(model.error_count(), errors);
                prop_assert_eq!(model.warning_count(), warnings);
                prop_assert_eq!(valid_flag.get(), model.is_valid());
            }
        }
    }
}
