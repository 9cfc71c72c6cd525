//! # keychord
//!
//! ## Overview
//!
//! This crate provides an environment-agnostic recognizer for vim-style multi-key chords
//! (`gg`, `nc`, and so on).
//!
//! The [SequenceMachine] component wraps a [KeymapTrie] with the mutable state of one
//! in-progress key sequence. It consumes one [InputKey] at a time and decides whether to
//! dispatch a bound action now, after a confirmation timeout, or not at all:
//!
//! * A sequence that no longer chord extends resolves immediately.
//! * A bound sequence that is also the prefix of a longer chord is dispatched only after
//!   [CHORD_TIMEOUT] passes without further input, so the longer chord can override it.
//! * A valid-but-unbound prefix waits for the rest of the chord, and is abandoned
//!   silently if the timeout passes first.
//! * A key that no binding can continue resets the sequence without dispatching.
//!
//! Timeouts are scheduled through a [TimerPort](timer::TimerPort) rather than a real
//! clock, so hosts integrate the machine with whatever timer facility their event loop
//! has, and tests drive expiry by hand.
//!
//! ## Example
//!
//! ```
//! use keychord::timer::ManualTimer;
//! use keychord::{Binding, KeymapTrie, SequenceMachine};
//!
//! #[derive(Clone, Debug, Eq, PartialEq)]
//! enum ViewerCommand {
//!     NextPage,
//!     FirstPage,
//!     LastPage,
//! }
//!
//! let mut trie = KeymapTrie::new();
//! trie.add_sequence(&['j'], Binding::new(ViewerCommand::NextPage, "Next page")).unwrap();
//! trie.add_sequence(&['g', 'g'], Binding::new(ViewerCommand::FirstPage, "First page")).unwrap();
//! trie.add_sequence(&['G'], Binding::new(ViewerCommand::LastPage, "Last page")).unwrap();
//!
//! let mut machine = SequenceMachine::from_trie(trie, ManualTimer::new());
//!
//! // "j" is not the prefix of any longer chord, so it resolves immediately.
//! let out = machine.process_key('j');
//! assert_eq!(out.dispatched.map(|b| b.action().clone()), Some(ViewerCommand::NextPage));
//! assert!(!out.recognizing);
//!
//! // The first "g" is only a prefix; the machine waits for more input.
//! let out = machine.process_key('g');
//! assert!(out.dispatched.is_none());
//! assert!(out.recognizing);
//! assert_eq!(machine.current_sequence(), "g");
//!
//! // The second "g" completes the chord.
//! let out = machine.process_key('g');
//! assert_eq!(out.dispatched.map(|b| b.action().clone()), Some(ViewerCommand::FirstPage));
//! assert_eq!(machine.current_sequence(), "");
//! ```

// Require docs for public APIs, and disable the more annoying clippy lints.
#![deny(missing_docs)]
#![allow(clippy::bool_to_int_with_if)]
#![allow(clippy::field_reassign_with_default)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::match_like_matches_macro)]
#![allow(clippy::needless_return)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
use std::borrow::Cow;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{trace, warn};

pub mod timer;

use self::timer::{TimerPort, TimerToken};

/// How long [SequenceMachine] waits before resolving an ambiguous chord or abandoning an
/// incomplete one.
///
/// The same duration covers both cases; there is no per-binding customization.
pub const CHORD_TIMEOUT: Duration = Duration::from_millis(1000);

/// Trait for keys that can be used with [KeymapTrie] and [SequenceMachine].
///
/// Implementors are expected to already be normalized for case and modifiers; the machine
/// compares keys for exact equality and nothing else.
pub trait InputKey: Clone + Eq + Hash {
    /// The label shown for this key in the sequence display and in binding listings.
    fn label(&self) -> Cow<'_, str>;
}

impl InputKey for char {
    fn label(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

impl InputKey for String {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl InputKey for &'static str {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(*self)
    }
}

/// An application command bound to a key sequence, along with its human-readable label.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Binding<A> {
    action: A,
    description: String,
}

impl<A> Binding<A> {
    /// Create a new binding.
    pub fn new(action: A, description: impl Into<String>) -> Self {
        Binding { action, description: description.into() }
    }

    /// The command to run when this binding's sequence is entered.
    pub fn action(&self) -> &A {
        &self.action
    }

    /// The label shown for this binding in help listings.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A `(sequence, description)` pair produced by [KeymapTrie::bindings].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BindingEntry {
    /// The concatenated labels of the keys in the sequence.
    pub keys: String,

    /// The bound action's description.
    pub description: String,
}

/// Errors that can occur when building a [KeymapTrie].
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum KeymapError {
    /// A binding was registered with no keys in its sequence.
    #[error("key sequences must contain at least one key")]
    EmptySequence,
}

/// A collection of bindings that can be added to a [KeymapTrie].
pub trait KeyBindings<K: InputKey, A> {
    /// Add this collection's bindings to the trie.
    fn setup(&self, trie: &mut KeymapTrie<K, A>) -> Result<(), KeymapError>;
}

struct TrieNode<K: InputKey, A> {
    children: IndexMap<K, TrieNode<K, A>>,
    binding: Option<Arc<Binding<A>>>,
}

impl<K: InputKey, A> TrieNode<K, A> {
    fn collect(&self, path: &mut Vec<K>, out: &mut Vec<BindingEntry>) {
        if let Some(binding) = &self.binding {
            out.push(BindingEntry {
                keys: path.iter().map(InputKey::label).collect(),
                description: binding.description().to_string(),
            });
        }

        for (key, child) in &self.children {
            path.push(key.clone());
            child.collect(path, out);
            path.pop();
        }
    }
}

impl<K: InputKey, A> Clone for TrieNode<K, A> {
    fn clone(&self) -> Self {
        TrieNode { children: self.children.clone(), binding: self.binding.clone() }
    }
}

impl<K: InputKey, A> Default for TrieNode<K, A> {
    fn default() -> Self {
        TrieNode { children: IndexMap::new(), binding: None }
    }
}

/// A prefix tree mapping ordered key sequences to bound actions.
///
/// The trie is built once, by inserting every configured binding, and is read-only during
/// operation. A node is terminal iff it holds a binding; terminality is independent of
/// whether longer sequences extend the same prefix, which is what makes chords like `g`
/// and `gg` able to coexist. Overlap is resolved at lookup time by [SequenceMachine], not
/// rejected at insertion time.
pub struct KeymapTrie<K: InputKey, A> {
    root: TrieNode<K, A>,
}

impl<K: InputKey, A> KeymapTrie<K, A> {
    /// Create an empty trie.
    pub fn new() -> Self {
        KeymapTrie { root: TrieNode::default() }
    }

    /// Create a trie holding the bindings provided by `B`.
    pub fn from_bindings<B: KeyBindings<K, A> + Default>() -> Result<Self, KeymapError> {
        let mut trie = KeymapTrie::new();

        B::default().setup(&mut trie)?;

        Ok(trie)
    }

    /// Insert a key sequence, creating intermediate nodes as needed.
    ///
    /// Inserting the same sequence twice silently overwrites the earlier binding at that
    /// node; longer and shorter sequences sharing a prefix are unaffected.
    pub fn add_sequence(&mut self, keys: &[K], binding: Binding<A>) -> Result<(), KeymapError> {
        if keys.is_empty() {
            return Err(KeymapError::EmptySequence);
        }

        let mut node = &mut self.root;

        for key in keys {
            node = node.children.entry(key.clone()).or_insert_with(TrieNode::default);
        }

        node.binding = Some(Arc::new(binding));

        Ok(())
    }

    fn find(&self, keys: &[K]) -> Option<&TrieNode<K, A>> {
        let mut node = &self.root;

        for key in keys {
            node = node.children.get(key)?;
        }

        Some(node)
    }

    /// Whether some registered sequence starts with `keys` (not necessarily terminally).
    pub fn is_valid_prefix(&self, keys: &[K]) -> bool {
        self.find(keys).is_some()
    }

    /// The binding at exactly `keys`, if that node exists and is terminal.
    pub fn binding(&self, keys: &[K]) -> Option<&Arc<Binding<A>>> {
        self.find(keys).and_then(|node| node.binding.as_ref())
    }

    /// Whether some longer registered sequence extends `keys`.
    pub fn has_children(&self, keys: &[K]) -> bool {
        self.find(keys).map(|node| !node.children.is_empty()).unwrap_or(false)
    }

    /// Enumerate every bound `(sequence, description)` pair.
    ///
    /// The order is a depth-first traversal visiting children in insertion order, which
    /// keeps help listings stable across runs.
    pub fn bindings(&self) -> Vec<BindingEntry> {
        let mut entries = Vec::new();
        let mut path = Vec::new();

        self.root.collect(&mut path, &mut entries);

        return entries;
    }
}

impl<K: InputKey, A> Clone for KeymapTrie<K, A> {
    fn clone(&self) -> Self {
        KeymapTrie { root: self.root.clone() }
    }
}

impl<K: InputKey, A> Default for KeymapTrie<K, A> {
    fn default() -> Self {
        KeymapTrie::new()
    }
}

/// The result of feeding one key to [SequenceMachine::process_key].
#[derive(Clone, Debug)]
pub struct KeyOutcome<A> {
    /// The binding resolved by this keypress, if it completed a chord.
    ///
    /// The binding has already been passed to the action executor; this field lets the
    /// caller update any UI without re-running the command.
    pub dispatched: Option<Arc<Binding<A>>>,

    /// Whether the machine is still waiting on more keys to resolve a chord. The caller
    /// should display [SequenceMachine::current_sequence] while this is true.
    pub recognizing: bool,
}

impl<A> KeyOutcome<A> {
    fn resolved(binding: Arc<Binding<A>>) -> Self {
        KeyOutcome { dispatched: Some(binding), recognizing: false }
    }

    fn pending() -> Self {
        KeyOutcome { dispatched: None, recognizing: true }
    }

    fn rejected() -> Self {
        KeyOutcome { dispatched: None, recognizing: false }
    }
}

/// What to do when the outstanding timeout fires.
enum Expiry<A> {
    /// Dispatch the bound prefix, since no longer chord arrived to override it.
    Dispatch(Arc<Binding<A>>),

    /// Abandon the partial chord silently.
    Abandon,
}

struct Armed<H, A> {
    token: TimerToken,
    handle: H,
    expiry: Expiry<A>,
}

/// Recognize multi-key chords, one [InputKey] at a time.
///
/// The machine owns a read-only [KeymapTrie] and the mutable state of the in-progress
/// sequence. Key events must arrive in the order the user pressed them, from a single
/// logical input stream; the machine does no buffering or reordering of its own. At most
/// one timeout is outstanding at any moment, and a new keypress always supersedes it.
///
/// Resolved bindings are dispatched through a single executor callback registered with
/// [set_action_executor](SequenceMachine::set_action_executor). Dispatch is a no-op until
/// one is registered, and registering again replaces the previous executor.
pub struct SequenceMachine<K: InputKey, A, T: TimerPort> {
    trie: KeymapTrie<K, A>,
    current: Vec<K>,
    timer: T,
    armed: Option<Armed<T::Handle, A>>,
    last_token: u64,
    executor: Option<Box<dyn FnMut(&Binding<A>)>>,
    reset_notifier: Option<Box<dyn FnMut()>>,
}

impl<K: InputKey, A, T: TimerPort> SequenceMachine<K, A, T> {
    /// Create a machine with no bindings.
    pub fn new(timer: T) -> Self {
        SequenceMachine::from_trie(KeymapTrie::new(), timer)
    }

    /// Create a machine around an already-built trie.
    pub fn from_trie(trie: KeymapTrie<K, A>, timer: T) -> Self {
        SequenceMachine {
            trie,
            current: Vec::new(),
            timer,
            armed: None,
            last_token: 0,
            executor: None,
            reset_notifier: None,
        }
    }

    /// Create a machine holding the bindings provided by `B`.
    pub fn from_bindings<B: KeyBindings<K, A> + Default>(timer: T) -> Result<Self, KeymapError> {
        Ok(SequenceMachine::from_trie(KeymapTrie::from_bindings::<B>()?, timer))
    }

    /// Insert a key sequence into the machine's trie.
    ///
    /// Bindings are meant to be loaded once, before the machine starts receiving keys.
    pub fn add_sequence(&mut self, keys: &[K], binding: Binding<A>) -> Result<(), KeymapError> {
        self.trie.add_sequence(keys, binding)
    }

    /// Replace the callback that resolved bindings are dispatched through.
    pub fn set_action_executor(&mut self, executor: impl FnMut(&Binding<A>) + 'static) {
        self.executor = Some(Box::new(executor));
    }

    /// Replace the callback invoked whenever the in-progress sequence resets, so a
    /// status-line collaborator can clear its pending-sequence indicator.
    pub fn set_reset_notifier(&mut self, notifier: impl FnMut() + 'static) {
        self.reset_notifier = Some(Box::new(notifier));
    }

    /// The machine's lookup structure.
    pub fn trie(&self) -> &KeymapTrie<K, A> {
        &self.trie
    }

    /// The machine's scheduling port.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Mutable access to the scheduling port, for hosts that poll it.
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// The in-progress sequence as a display string: concatenated key labels, empty when
    /// idle.
    pub fn current_sequence(&self) -> String {
        self.current.iter().map(InputKey::label).collect()
    }

    /// Enumerate every bound `(sequence, description)` pair, for help screens.
    pub fn bindings(&self) -> Vec<BindingEntry> {
        self.trie.bindings()
    }

    /// Process one typed key.
    ///
    /// Exactly one of the following happens: a chord resolves and its binding is
    /// dispatched, a timeout is armed while the machine waits for more input, or the
    /// sequence resets because no binding can continue it. A mistyped key aborts the
    /// whole in-progress chord rather than attempting resynchronization.
    pub fn process_key(&mut self, key: K) -> KeyOutcome<A> {
        // A new keypress supersedes any outstanding timeout.
        self.disarm();

        self.current.push(key);

        if !self.trie.is_valid_prefix(&self.current) {
            trace!(
                sequence = %self.current_sequence(),
                "sequence does not start any binding; resetting"
            );

            self.reset();

            return KeyOutcome::rejected();
        }

        let bound = self.trie.binding(&self.current).cloned();
        let extendable = self.trie.has_children(&self.current);

        match (bound, extendable) {
            (Some(binding), false) => {
                // Unambiguous terminal: nothing extends this chord.
                trace!(
                    sequence = %self.current_sequence(),
                    action = binding.description(),
                    "chord resolved"
                );

                self.dispatch(&binding);
                self.reset();

                KeyOutcome::resolved(binding)
            },
            (Some(binding), true) => {
                // Bound, but a longer chord could still override it. Hold the dispatch
                // until the confirmation timeout fires.
                trace!(
                    sequence = %self.current_sequence(),
                    action = binding.description(),
                    "chord bound but extendable; deferring dispatch"
                );

                self.arm(Expiry::Dispatch(binding));

                KeyOutcome::pending()
            },
            (None, true) => {
                // Valid partial chord; wait for the rest of it.
                trace!(sequence = %self.current_sequence(), "partial chord; waiting");

                self.arm(Expiry::Abandon);

                KeyOutcome::pending()
            },
            (None, false) => {
                // Unreachable in a well-formed trie: add_sequence cannot create a node
                // with neither a binding nor children.
                debug_assert!(false, "trie node has neither binding nor children");
                warn!(sequence = %self.current_sequence(), "malformed trie node; resetting");

                self.reset();

                KeyOutcome::rejected()
            },
        }
    }

    /// Deliver an expired timeout.
    ///
    /// Tokens that no longer match the outstanding timeout are ignored, which covers
    /// hosts that already had the expiry queued when the timer was cancelled. Each
    /// timeout dispatches at most once.
    pub fn timer_fired(&mut self, token: TimerToken) {
        match self.armed.take() {
            Some(armed) if armed.token == token => match armed.expiry {
                Expiry::Dispatch(binding) => {
                    trace!(action = binding.description(), "confirmation timeout; dispatching");

                    self.reset();
                    self.dispatch(&binding);
                },
                Expiry::Abandon => {
                    trace!(sequence = %self.current_sequence(), "chord abandoned");

                    self.reset();
                },
            },
            other => {
                // Stale expiry from a superseded timer.
                self.armed = other;
            },
        }
    }

    /// Clear the in-progress sequence and cancel any outstanding timeout.
    ///
    /// This is the explicit-cancel entry point (e.g. for Escape, which the caller handles
    /// without going through the trie). Resetting an idle machine is a no-op apart from
    /// the reset notifier, which is invoked on every reset.
    pub fn reset(&mut self) {
        self.current.clear();
        self.disarm();

        if let Some(notify) = self.reset_notifier.as_mut() {
            notify();
        }
    }

    fn dispatch(&mut self, binding: &Binding<A>) {
        if let Some(execute) = self.executor.as_mut() {
            execute(binding);
        }
    }

    fn arm(&mut self, expiry: Expiry<A>) {
        self.last_token += 1;

        let token = TimerToken::new(self.last_token);
        let handle = self.timer.schedule_once(CHORD_TIMEOUT, token);

        self.armed = Some(Armed { token, handle, expiry });
    }

    fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            self.timer.cancel(armed.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualTimer;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Debug, Eq, PartialEq)]
    enum TestAction {
        NextPage,
        PrevPage,
        FirstPage,
        LastPage,
        CreateNote,
        ListNotes,
        Mark,
        MarkAll,
    }

    type TestMachine = SequenceMachine<char, TestAction, ManualTimer>;

    macro_rules! bind {
        ($sm: expr, [$( $k: expr ),*], $act: expr, $desc: expr) => {
            $sm.add_sequence(&[$( $k, )*], Binding::new($act, $desc)).unwrap()
        };
    }

    macro_rules! assert_resolved {
        ($out: expr, $act: expr) => {
            let out = $out;
            assert_eq!(out.dispatched.map(|b| b.action().clone()), Some($act));
            assert_eq!(out.recognizing, false);
        };
    }

    macro_rules! assert_pending {
        ($out: expr) => {
            let out = $out;
            assert!(out.dispatched.is_none());
            assert_eq!(out.recognizing, true);
        };
    }

    macro_rules! assert_rejected {
        ($out: expr) => {
            let out = $out;
            assert!(out.dispatched.is_none());
            assert_eq!(out.recognizing, false);
        };
    }

    /*
     * The test bindings exercise every shape the disambiguation policy cares about:
     *
     *     - "j" and "G" are plain single-key bindings.
     *     - "gg" leaves "g" as a valid-but-unbound prefix (the abandon case).
     *     - "nc" and "nl" share the unbound prefix "n" with different continuations.
     *     - "m" is bound and is also the prefix of "mm" (the deferred-dispatch case).
     */
    fn machine() -> TestMachine {
        let mut sm = TestMachine::new(ManualTimer::new());

        bind!(sm, ['j'], TestAction::NextPage, "Next page");
        bind!(sm, ['k'], TestAction::PrevPage, "Previous page");
        bind!(sm, ['g', 'g'], TestAction::FirstPage, "First page");
        bind!(sm, ['G'], TestAction::LastPage, "Last page");
        bind!(sm, ['n', 'c'], TestAction::CreateNote, "Create annotation");
        bind!(sm, ['n', 'l'], TestAction::ListNotes, "List annotations");
        bind!(sm, ['m'], TestAction::Mark, "Mark page");
        bind!(sm, ['m', 'm'], TestAction::MarkAll, "Mark all pages");

        sm
    }

    fn record(sm: &mut TestMachine) -> Rc<RefCell<Vec<TestAction>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);

        sm.set_action_executor(move |b: &Binding<TestAction>| {
            sink.borrow_mut().push(b.action().clone());
        });

        return log;
    }

    #[test]
    fn test_single_key_immediate() {
        let mut sm = machine();
        let log = record(&mut sm);

        assert_resolved!(sm.process_key('j'), TestAction::NextPage);
        assert_eq!(sm.current_sequence(), "");
        assert_eq!(*log.borrow(), vec![TestAction::NextPage]);

        // No timeout is left behind.
        assert_eq!(sm.timer().last_armed(), None);

        assert_resolved!(sm.process_key('G'), TestAction::LastPage);
        assert_eq!(*log.borrow(), vec![TestAction::NextPage, TestAction::LastPage]);
    }

    #[test]
    fn test_two_key_chord() {
        let mut sm = machine();
        let log = record(&mut sm);

        // "n" alone is unbound, but starts "nc" and "nl".
        assert_pending!(sm.process_key('n'));
        assert_eq!(sm.current_sequence(), "n");
        assert!(log.borrow().is_empty());

        assert_resolved!(sm.process_key('c'), TestAction::CreateNote);
        assert_eq!(sm.current_sequence(), "");
        assert_eq!(*log.borrow(), vec![TestAction::CreateNote]);

        // The other continuation works from a fresh sequence.
        assert_pending!(sm.process_key('n'));
        assert_resolved!(sm.process_key('l'), TestAction::ListNotes);
        assert_eq!(*log.borrow(), vec![TestAction::CreateNote, TestAction::ListNotes]);
    }

    #[test]
    fn test_ambiguous_prefix_deferred() {
        let mut sm = machine();
        let log = record(&mut sm);

        // "m" is bound, but "mm" could still arrive; the dispatch is deferred.
        assert_pending!(sm.process_key('m'));
        assert!(log.borrow().is_empty());

        let (token, after) = sm.timer_mut().pop_armed().unwrap();
        assert_eq!(after, CHORD_TIMEOUT);

        sm.timer_fired(token);
        assert_eq!(*log.borrow(), vec![TestAction::Mark]);
        assert_eq!(sm.current_sequence(), "");

        // Delivering the same expiry again cannot double-dispatch.
        sm.timer_fired(token);
        assert_eq!(*log.borrow(), vec![TestAction::Mark]);
    }

    #[test]
    fn test_ambiguous_prefix_overridden() {
        let mut sm = machine();
        let log = record(&mut sm);

        assert_pending!(sm.process_key('m'));
        let first = sm.timer().last_armed().unwrap();

        // The second "m" arrives in time: the longer chord wins and the deferred
        // dispatch for "m" alone is cancelled.
        assert_resolved!(sm.process_key('m'), TestAction::MarkAll);
        assert_eq!(*log.borrow(), vec![TestAction::MarkAll]);
        assert_eq!(sm.timer().last_armed(), None);

        // A late delivery of the cancelled timer is ignored.
        sm.timer_fired(first);
        assert_eq!(*log.borrow(), vec![TestAction::MarkAll]);
    }

    #[test]
    fn test_abandoned_chord() {
        let mut sm = machine();
        let log = record(&mut sm);

        // "g" alone is unbound in these bindings, so the timeout abandons it.
        assert_pending!(sm.process_key('g'));
        assert_eq!(sm.current_sequence(), "g");

        let (token, _) = sm.timer_mut().pop_armed().unwrap();
        sm.timer_fired(token);

        assert!(log.borrow().is_empty());
        assert_eq!(sm.current_sequence(), "");

        // The chord still works when completed in time.
        assert_pending!(sm.process_key('g'));
        assert_resolved!(sm.process_key('g'), TestAction::FirstPage);
        assert_eq!(*log.borrow(), vec![TestAction::FirstPage]);
    }

    #[test]
    fn test_invalid_continuation() {
        let mut sm = machine();
        let log = record(&mut sm);

        // "n" then "x" doesn't continue any binding; the whole chord is aborted.
        assert_pending!(sm.process_key('n'));
        assert_rejected!(sm.process_key('x'));
        assert_eq!(sm.current_sequence(), "");
        assert!(log.borrow().is_empty());
        assert_eq!(sm.timer().last_armed(), None);

        // Same for a key that starts nothing at all.
        assert_rejected!(sm.process_key('z'));
        assert_eq!(sm.current_sequence(), "");

        // An invalid continuation after a bound prefix drops the pending dispatch too.
        assert_pending!(sm.process_key('m'));
        assert_rejected!(sm.process_key('x'));

        let stale = sm.timer_mut().pop_armed();
        assert_eq!(stale, None);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_timer_supersession() {
        let mut sm = machine();
        let log = record(&mut sm);

        // Both "n" and "nc"-less continuations arm timers; only the most recent one is
        // live at any moment.
        assert_pending!(sm.process_key('n'));
        let first = sm.timer().last_armed().unwrap();

        assert_rejected!(sm.process_key('q'));
        assert_pending!(sm.process_key('m'));
        let second = sm.timer().last_armed().unwrap();
        assert_ne!(first, second);
        assert_eq!(sm.timer().armed().len(), 1);

        // Only the live timer dispatches, and exactly once.
        sm.timer_fired(first);
        assert!(log.borrow().is_empty());

        sm.timer_fired(second);
        assert_eq!(*log.borrow(), vec![TestAction::Mark]);

        sm.timer_fired(second);
        assert_eq!(*log.borrow(), vec![TestAction::Mark]);
    }

    #[test]
    fn test_explicit_reset() {
        let mut sm = machine();
        let log = record(&mut sm);

        let resets = Rc::new(RefCell::new(0usize));
        let counter = Rc::clone(&resets);
        sm.set_reset_notifier(move || *counter.borrow_mut() += 1);

        // Resetting while idle is a no-op apart from the notification.
        sm.reset();
        assert_eq!(sm.current_sequence(), "");
        assert_eq!(*resets.borrow(), 1);

        // Escape-style cancel mid-chord: no dispatch, no leftover timer.
        assert_pending!(sm.process_key('m'));
        sm.reset();
        assert_eq!(sm.current_sequence(), "");
        assert_eq!(sm.timer().last_armed(), None);
        assert!(log.borrow().is_empty());
        assert_eq!(*resets.borrow(), 2);

        // Resolution and rejection notify as well.
        assert_resolved!(sm.process_key('j'), TestAction::NextPage);
        assert_eq!(*resets.borrow(), 3);

        assert_rejected!(sm.process_key('z'));
        assert_eq!(*resets.borrow(), 4);
    }

    #[test]
    fn test_executor_registration() {
        let mut sm = machine();

        // No executor registered yet: processing must not panic, and the caller still
        // sees the resolved binding.
        assert_resolved!(sm.process_key('j'), TestAction::NextPage);

        // Last registration wins.
        let first = record(&mut sm);
        let second = record(&mut sm);

        assert_resolved!(sm.process_key('k'), TestAction::PrevPage);
        assert!(first.borrow().is_empty());
        assert_eq!(*second.borrow(), vec![TestAction::PrevPage]);
    }

    #[test]
    fn test_bindings_listing() {
        let sm = machine();

        let entry = |keys: &str, description: &str| BindingEntry {
            keys: keys.to_string(),
            description: description.to_string(),
        };

        // DFS over children in insertion order, with shared prefixes listed once per
        // bound sequence and no duplicates.
        assert_eq!(sm.bindings(), vec![
            entry("j", "Next page"),
            entry("k", "Previous page"),
            entry("gg", "First page"),
            entry("G", "Last page"),
            entry("nc", "Create annotation"),
            entry("nl", "List annotations"),
            entry("m", "Mark page"),
            entry("mm", "Mark all pages"),
        ]);
    }

    #[test]
    fn test_last_write_wins() {
        let mut sm = machine();

        bind!(sm, ['g', 'g'], TestAction::LastPage, "Overridden");

        let binding = sm.trie().binding(&['g', 'g']).unwrap();
        assert_eq!(binding.action(), &TestAction::LastPage);
        assert_eq!(binding.description(), "Overridden");

        // Still a single entry for the sequence.
        let entries = sm.bindings();
        let gg: Vec<_> = entries.iter().filter(|e| e.keys == "gg").collect();
        assert_eq!(gg.len(), 1);
        assert_eq!(gg[0].description, "Overridden");
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let mut sm: TestMachine = SequenceMachine::new(ManualTimer::new());

        let res = sm.add_sequence(&[], Binding::new(TestAction::Mark, "Mark page"));
        assert_eq!(res, Err(KeymapError::EmptySequence));
    }

    #[test]
    fn test_trie_queries() {
        let sm = machine();
        let trie = sm.trie();

        assert!(trie.is_valid_prefix(&[]));
        assert!(trie.is_valid_prefix(&['g']));
        assert!(trie.is_valid_prefix(&['g', 'g']));
        assert!(!trie.is_valid_prefix(&['g', 'h']));
        assert!(!trie.is_valid_prefix(&['z']));

        assert!(trie.binding(&['g']).is_none());
        assert!(trie.binding(&['g', 'g']).is_some());
        assert!(trie.binding(&['z']).is_none());

        assert!(trie.has_children(&[]));
        assert!(trie.has_children(&['g']));
        assert!(!trie.has_children(&['g', 'g']));
        assert!(trie.has_children(&['m']));
        assert!(!trie.has_children(&['z']));
    }

    #[test]
    fn test_string_key_labels() {
        let mut sm: SequenceMachine<&'static str, TestAction, ManualTimer> =
            SequenceMachine::new(ManualTimer::new());

        sm.add_sequence(&["g", "g"], Binding::new(TestAction::FirstPage, "First page"))
            .unwrap();
        sm.add_sequence(&["PageDown"], Binding::new(TestAction::NextPage, "Next page"))
            .unwrap();

        assert_pending!(sm.process_key("g"));
        assert_eq!(sm.current_sequence(), "g");
        assert_resolved!(sm.process_key("g"), TestAction::FirstPage);

        assert_resolved!(sm.process_key("PageDown"), TestAction::NextPage);

        let entries = sm.bindings();
        assert_eq!(entries[0].keys, "gg");
        assert_eq!(entries[1].keys, "PageDown");
    }

    #[test]
    fn test_shared_trie() {
        // The trie holds no per-session state, so independent machines can be built
        // from clones of the same table.
        let trie = machine().trie().clone();

        let mut a = TestMachine::from_trie(trie.clone(), ManualTimer::new());
        let mut b = TestMachine::from_trie(trie, ManualTimer::new());

        assert_pending!(a.process_key('n'));
        assert_resolved!(b.process_key('j'), TestAction::NextPage);

        // Machine A's sequence is unaffected by B's input.
        assert_eq!(a.current_sequence(), "n");
        assert_resolved!(a.process_key('c'), TestAction::CreateNote);
    }
}
