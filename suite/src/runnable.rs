//! Shared annotatable state for tests and suites, and the `Runnable` trait
//! exposing the modifier methods the authoring surface calls.

use crate::modifier::{Annotation, ModifierArg, ModifierKind};
use crate::tree::SuiteId;
use ipc::TestStatus;
use tracing::trace;

/// State every runnable node carries: identity, source provenance, modifier
/// flags, and the full history of modifier applications.
///
/// Flags are monotonic: a live modifier application sets the corresponding
/// flag and nothing ever clears it. Parent links are arena ids, so a node
/// never owns its ancestors.
#[derive(Debug, Clone, Default)]
pub struct RunnableState {
    title: String,
    file: String,
    location: String,
    parent: Option<SuiteId>,
    only: bool,
    skipped: bool,
    slow: bool,
    flaky: bool,
    expected_status: Option<TestStatus>,
    annotations: Vec<Annotation>,
    id: Option<String>,
    ordinal: Option<usize>,
}

impl RunnableState {
    pub(crate) fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Record where this node was declared. Set once by the loader.
    pub fn set_source(&mut self, file: impl Into<String>, location: impl Into<String>) {
        self.file = file.into();
        self.location = location.into();
    }

    pub fn parent(&self) -> Option<SuiteId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: SuiteId) {
        self.parent = Some(parent);
    }

    pub fn is_only(&self) -> bool {
        self.only
    }

    pub fn set_only(&mut self, only: bool) {
        self.only = only;
    }

    /// Local skip flag, ignoring ancestors. [`crate::tree::SuiteTree::is_skipped`]
    /// folds in the parent chain.
    pub fn skipped_self(&self) -> bool {
        self.skipped
    }

    pub fn slow_self(&self) -> bool {
        self.slow
    }

    pub fn flaky_self(&self) -> bool {
        self.flaky
    }

    /// The expectation explicitly declared on this node, if any. `None`
    /// falls back to the parent chain and ultimately to passed.
    pub fn expected_status_self(&self) -> Option<TestStatus> {
        self.expected_status
    }

    /// Annotations recorded on this node, in application order. Ancestors'
    /// records are not included; see [`crate::tree::SuiteTree::annotations`].
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Assigned identity string. `None` until the identity pass runs.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    /// Position in depth-first traversal order. `None` until renumbering.
    pub fn ordinal(&self) -> Option<usize> {
        self.ordinal
    }

    pub(crate) fn set_ordinal(&mut self, ordinal: usize) {
        self.ordinal = Some(ordinal);
    }

    /// Apply a conditional modifier to this node.
    ///
    /// A live application sets the flag for `kind` (skip and fixme both set
    /// the skip flag, fail sets the expected status to failed) and appends
    /// one annotation record. A condition-false call changes no state at
    /// all, not even the annotation history.
    pub fn apply(&mut self, kind: ModifierKind, arg: ModifierArg) {
        let Some(description) = arg.interpret() else {
            return;
        };
        match kind {
            ModifierKind::Skip | ModifierKind::Fixme => self.skipped = true,
            ModifierKind::Slow => self.slow = true,
            ModifierKind::Flaky => self.flaky = true,
            ModifierKind::Fail => self.expected_status = Some(TestStatus::Failed),
        }
        trace!(title = %self.title, %kind, "modifier applied");
        self.annotations.push(Annotation { kind, description });
    }
}

/// Capability set shared by tests and suites: access to the annotatable
/// state plus the modifier methods of the authoring surface.
pub trait Runnable {
    fn state(&self) -> &RunnableState;

    fn state_mut(&mut self) -> &mut RunnableState;

    fn title(&self) -> &str {
        self.state().title()
    }

    /// Skip this node (and, through inheritance, everything beneath it).
    fn skip(&mut self, arg: impl Into<ModifierArg>) {
        self.state_mut().apply(ModifierKind::Skip, arg.into());
    }

    /// Like [`skip`](Runnable::skip), but recorded as `fixme` so reporters
    /// can tell known-broken tests apart from intentionally disabled ones.
    fn fixme(&mut self, arg: impl Into<ModifierArg>) {
        self.state_mut().apply(ModifierKind::Fixme, arg.into());
    }

    /// Mark this node slow; the execution layer grants slow tests extra time.
    fn slow(&mut self, arg: impl Into<ModifierArg>) {
        self.state_mut().apply(ModifierKind::Slow, arg.into());
    }

    /// Mark this node flaky; retry policy reads the inherited flag.
    fn flaky(&mut self, arg: impl Into<ModifierArg>) {
        self.state_mut().apply(ModifierKind::Flaky, arg.into());
    }

    /// Declare that this node is expected to fail.
    fn fail(&mut self, arg: impl Into<ModifierArg>) {
        self.state_mut().apply(ModifierKind::Fail, arg.into());
    }
}
