//! # viewer-keys
//!
//! ## Overview
//!
//! The key vocabulary of the document viewer: a typed action enum covering navigation,
//! annotations, view switching, search, mode changes and layout overlays, plus the
//! compiled-in vim-style binding table that wires it into [keychord].
//!
//! The table is deliberately static. Bindings ship with the application, so there is no
//! serialization format; anything that wants to present them (the help panel, the status
//! line) goes through [SequenceMachine::bindings](keychord::SequenceMachine::bindings).
//!
//! ## Example
//!
//! ```
//! use keychord::timer::ManualTimer;
//! use viewer_keys::{default_machine, PageMotion, ViewerAction};
//!
//! let mut machine = default_machine(ManualTimer::new()).unwrap();
//!
//! let out = machine.process_key('j');
//! let action = out.dispatched.map(|b| *b.action());
//! assert_eq!(action, Some(ViewerAction::Navigate(PageMotion::Next)));
//!
//! // "gg" is a chord; the first "g" only starts it.
//! assert!(machine.process_key('g').recognizing);
//! let out = machine.process_key('g');
//! let action = out.dispatched.map(|b| *b.action());
//! assert_eq!(action, Some(ViewerAction::Navigate(PageMotion::First)));
//! ```

#![deny(missing_docs)]

use std::fmt;

use keychord::timer::TimerPort;
use keychord::{Binding, KeyBindings, KeymapError, KeymapTrie, SequenceMachine};

/// Page and viewport motions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageMotion {
    /// Go to the next page.
    Next,

    /// Go to the previous page.
    Previous,

    /// Pan the viewport left.
    Left,

    /// Pan the viewport right.
    Right,

    /// Jump to the first page.
    First,

    /// Jump to the last page.
    Last,
}

/// Operations on page annotations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnnotationOp {
    /// Create an annotation at the current position.
    Create,

    /// Edit the selected annotation.
    Edit,

    /// Delete the selected annotation.
    Delete,

    /// List every annotation in the document.
    List,
}

/// The viewer's top-level view surfaces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ViewKind {
    /// The rendered page preview.
    Preview,

    /// The detected document outline.
    Outline,

    /// Extracted text without the rendered page.
    TextOnly,
}

/// Which way a search moves through the document.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SearchDirection {
    /// Search towards the end of the document.
    Forward,

    /// Search towards the beginning of the document.
    Backward,
}

/// Input modes the viewer can switch into.
///
/// Mode handling itself lives with the host's key-event listener; these actions only
/// tell it which mode was requested.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputMode {
    /// The `:` command line.
    Command,

    /// Free-text entry, e.g. while editing an annotation.
    Insert,
}

/// Toggles and paging for the layout-analysis overlays.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayoutOp {
    /// Show or hide the layout view.
    ToggleView,

    /// Show or hide the document outline panel.
    ToggleOutline,

    /// Show or hide the detected region boxes.
    ToggleBoxes,

    /// Show or hide extracted text content.
    ToggleText,

    /// Next page while the layout view is open.
    NextPage,

    /// Previous page while the layout view is open.
    PreviousPage,
}

/// Every command the viewer's keymap can dispatch.
///
/// [Display](fmt::Display) renders the stable dotted identifier used in logs, e.g.
/// `navigation.first-page`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ViewerAction {
    /// Move through the document.
    Navigate(PageMotion),

    /// Work with annotations.
    Annotate(AnnotationOp),

    /// Switch the main view surface.
    SwitchView(ViewKind),

    /// Start a search.
    Search(SearchDirection),

    /// Ask the host to change input mode.
    EnterMode(InputMode),

    /// Show or hide the help overlay.
    ToggleHelp,

    /// Control the layout-analysis overlays.
    Layout(LayoutOp),
}

impl fmt::Display for ViewerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self {
            ViewerAction::Navigate(PageMotion::Next) => "navigation.next-page",
            ViewerAction::Navigate(PageMotion::Previous) => "navigation.previous-page",
            ViewerAction::Navigate(PageMotion::Left) => "navigation.left",
            ViewerAction::Navigate(PageMotion::Right) => "navigation.right",
            ViewerAction::Navigate(PageMotion::First) => "navigation.first-page",
            ViewerAction::Navigate(PageMotion::Last) => "navigation.last-page",
            ViewerAction::Annotate(AnnotationOp::Create) => "annotation.create",
            ViewerAction::Annotate(AnnotationOp::Edit) => "annotation.edit",
            ViewerAction::Annotate(AnnotationOp::Delete) => "annotation.delete",
            ViewerAction::Annotate(AnnotationOp::List) => "annotation.list",
            ViewerAction::SwitchView(ViewKind::Preview) => "view.preview",
            ViewerAction::SwitchView(ViewKind::Outline) => "view.outline",
            ViewerAction::SwitchView(ViewKind::TextOnly) => "view.text-only",
            ViewerAction::Search(SearchDirection::Forward) => "search.forward",
            ViewerAction::Search(SearchDirection::Backward) => "search.backward",
            ViewerAction::EnterMode(InputMode::Command) => "mode.command",
            ViewerAction::EnterMode(InputMode::Insert) => "mode.insert",
            ViewerAction::ToggleHelp => "help.toggle",
            ViewerAction::Layout(LayoutOp::ToggleView) => "layout.toggle-view",
            ViewerAction::Layout(LayoutOp::ToggleOutline) => "layout.toggle-outline",
            ViewerAction::Layout(LayoutOp::ToggleBoxes) => "layout.toggle-boxes",
            ViewerAction::Layout(LayoutOp::ToggleText) => "layout.toggle-text",
            ViewerAction::Layout(LayoutOp::NextPage) => "layout.next-page",
            ViewerAction::Layout(LayoutOp::PreviousPage) => "layout.previous-page",
        };

        f.write_str(id)
    }
}

/// The default binding table, as `(chord, action, description)` rows.
///
/// Single keys resolve immediately; chords like `gg` or `nc` share unbound prefixes and
/// are completed key by key. Nothing in this table binds an action to a strict prefix of
/// another chord, so no binding here waits on the confirmation timeout.
pub const DEFAULT_BINDINGS: &[(&str, ViewerAction, &str)] = &[
    ("j", ViewerAction::Navigate(PageMotion::Next), "Next page"),
    ("k", ViewerAction::Navigate(PageMotion::Previous), "Previous page"),
    ("h", ViewerAction::Navigate(PageMotion::Left), "Pan left"),
    ("l", ViewerAction::Navigate(PageMotion::Right), "Pan right"),
    ("gg", ViewerAction::Navigate(PageMotion::First), "Jump to first page"),
    ("G", ViewerAction::Navigate(PageMotion::Last), "Jump to last page"),
    ("nc", ViewerAction::Annotate(AnnotationOp::Create), "Create annotation"),
    ("ne", ViewerAction::Annotate(AnnotationOp::Edit), "Edit annotation"),
    ("nd", ViewerAction::Annotate(AnnotationOp::Delete), "Delete annotation"),
    ("nl", ViewerAction::Annotate(AnnotationOp::List), "List annotations"),
    ("1", ViewerAction::SwitchView(ViewKind::Preview), "Preview view"),
    ("2", ViewerAction::SwitchView(ViewKind::Outline), "Outline view"),
    ("3", ViewerAction::SwitchView(ViewKind::TextOnly), "Text-only view"),
    ("sf", ViewerAction::Search(SearchDirection::Forward), "Search forward"),
    ("sb", ViewerAction::Search(SearchDirection::Backward), "Search backward"),
    (":", ViewerAction::EnterMode(InputMode::Command), "Enter command mode"),
    ("i", ViewerAction::EnterMode(InputMode::Insert), "Enter insert mode"),
    ("?", ViewerAction::ToggleHelp, "Toggle help"),
    ("vl", ViewerAction::Layout(LayoutOp::ToggleView), "Toggle layout view"),
    ("vo", ViewerAction::Layout(LayoutOp::ToggleOutline), "Toggle document outline"),
    ("vb", ViewerAction::Layout(LayoutOp::ToggleBoxes), "Toggle layout boxes"),
    ("vt", ViewerAction::Layout(LayoutOp::ToggleText), "Toggle text content"),
    ("pj", ViewerAction::Layout(LayoutOp::NextPage), "Layout view next page"),
    ("pk", ViewerAction::Layout(LayoutOp::PreviousPage), "Layout view previous page"),
];

/// Loads [DEFAULT_BINDINGS] into a [KeymapTrie].
#[derive(Clone, Copy, Debug, Default)]
pub struct ViewerBindings {}

impl KeyBindings<char, ViewerAction> for ViewerBindings {
    fn setup(&self, trie: &mut KeymapTrie<char, ViewerAction>) -> Result<(), KeymapError> {
        for (chord, action, description) in DEFAULT_BINDINGS {
            let keys: Vec<char> = chord.chars().collect();

            trie.add_sequence(&keys, Binding::new(*action, *description))?;
        }

        Ok(())
    }
}

/// A [SequenceMachine] over the viewer's key vocabulary.
pub type ViewerMachine<T> = SequenceMachine<char, ViewerAction, T>;

/// Build a machine preloaded with [DEFAULT_BINDINGS].
pub fn default_machine<T: TimerPort>(timer: T) -> Result<ViewerMachine<T>, KeymapError> {
    ViewerMachine::from_bindings::<ViewerBindings>(timer)
}
