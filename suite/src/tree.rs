//! The per-file suite tree: an arena of suites and tests with ordered
//! containment, hook registration, tree-wide passes, and the inherited
//! modifier queries the execution layer reads before running each test.

use crate::modifier::Annotation;
use crate::runnable::{Runnable, RunnableState};
use ipc::{HookKind, TestResult, TestStatus};
use std::fmt;
use std::iter;
use std::ops::{Index, IndexMut};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Opaque test body. The tree stores it; only the execution layer invokes it.
pub type TestBody = Arc<dyn Fn() + Send + Sync>;

/// Opaque hook body, same contract as [`TestBody`].
pub type HookBody = Arc<dyn Fn() + Send + Sync>;

/// Misuse reported during tree construction and identity assignment.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("\"{child}\" is already attached to a parent suite")]
    AlreadyAttached { child: String },

    #[error("attaching \"{child}\" under \"{parent}\" would make the suite chain cyclic")]
    WouldCycle { child: String, parent: String },

    #[error("assign_ids called on \"{root}\" before renumber")]
    NotRenumbered { root: String },
}

pub type TreeResult<T> = Result<T, TreeError>;

/// Handle to a suite stored in a [`SuiteTree`].
///
/// Handles are only meaningful for the tree that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuiteId(usize);

/// Handle to a test stored in a [`SuiteTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestId(usize);

/// Either kind of node: what the unified entry list holds and what the
/// inherited queries accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Suite(SuiteId),
    Test(TestId),
}

impl From<SuiteId> for NodeId {
    fn from(id: SuiteId) -> Self {
        NodeId::Suite(id)
    }
}

impl From<TestId> for NodeId {
    fn from(id: TestId) -> Self {
        NodeId::Test(id)
    }
}

/// A registered lifecycle hook.
///
/// Hooks of a given kind must later run in exactly their registration order;
/// ordering across nested suites is the execution layer's concern.
#[derive(Clone)]
pub struct Hook {
    pub kind: HookKind,
    pub body: HookBody,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").field("kind", &self.kind).finish()
    }
}

/// A single runnable unit: a body, accumulated per-attempt results, and an
/// optional timeout override.
pub struct TestNode {
    state: RunnableState,
    body: TestBody,
    results: Vec<TestResult>,
    timeout: Option<Duration>,
}

impl Runnable for TestNode {
    fn state(&self) -> &RunnableState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RunnableState {
        &mut self.state
    }
}

impl TestNode {
    fn new(title: impl Into<String>, body: TestBody) -> Self {
        Self {
            state: RunnableState::new(title),
            body,
            results: Vec::new(),
            timeout: None,
        }
    }

    pub fn body(&self) -> &TestBody {
        &self.body
    }

    /// One record per execution attempt; retries append further records.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn push_result(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// The explicit timeout override, if one was declared.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// The override, or the ambient default from the worker configuration.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }
}

impl fmt::Debug for TestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestNode")
            .field("title", &self.state.title())
            .field("results", &self.results.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A container node: ordered child suites and tests, the unified entry
/// list, and registered hooks.
#[derive(Debug)]
pub struct SuiteNode {
    state: RunnableState,
    suites: Vec<SuiteId>,
    tests: Vec<TestId>,
    entries: Vec<NodeId>,
    hooks: Vec<Hook>,
}

impl Runnable for SuiteNode {
    fn state(&self) -> &RunnableState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RunnableState {
        &mut self.state
    }
}

impl SuiteNode {
    fn new(title: impl Into<String>) -> Self {
        Self {
            state: RunnableState::new(title),
            suites: Vec::new(),
            tests: Vec::new(),
            entries: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Child suites in the order they were attached.
    pub fn suites(&self) -> &[SuiteId] {
        &self.suites
    }

    /// Direct child tests in the order they were attached.
    pub fn tests(&self) -> &[TestId] {
        &self.tests
    }

    /// Children in declaration order, tests and suites interleaved.
    ///
    /// This is the order reporters present. Traversal passes
    /// ([`SuiteTree::find_test`], renumbering, identity assignment) use the
    /// suites-before-tests order instead; the two orders differ whenever a
    /// suite is declared between two tests.
    pub fn entries(&self) -> &[NodeId] {
        &self.entries
    }

    /// Registered hooks, registration order preserved.
    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }
}

/// Arena owning every suite and test declared in one test file.
///
/// Parent-to-child ownership lives in the arena's vectors; child-to-parent
/// links are plain ids, so the reference cycle of the containment tree never
/// becomes an ownership cycle. One tree is built per file by the
/// registration layer, renumbered once, and then only queried.
#[derive(Debug, Default)]
pub struct SuiteTree {
    suites: Vec<SuiteNode>,
    tests: Vec<TestNode>,
}

impl SuiteTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unparented suite. The file's root suite stays unparented
    /// and gets its source set via [`RunnableState::set_source`].
    pub fn create_suite(&mut self, title: impl Into<String>) -> SuiteId {
        let id = SuiteId(self.suites.len());
        self.suites.push(SuiteNode::new(title));
        id
    }

    /// Create an unparented test holding `body`.
    pub fn create_test(&mut self, title: impl Into<String>, body: TestBody) -> TestId {
        let id = TestId(self.tests.len());
        self.tests.push(TestNode::new(title, body));
        id
    }

    /// Attach `child` under `parent`, appending to the child-suite list and
    /// the unified entry list. A node attaches exactly once.
    pub fn add_suite(&mut self, parent: SuiteId, child: SuiteId) -> TreeResult<()> {
        self.check_attachable(parent, child.into())?;
        self.suites[child.0].state.set_parent(parent);
        let node = &mut self.suites[parent.0];
        node.suites.push(child);
        node.entries.push(child.into());
        Ok(())
    }

    /// Attach `test` under `parent`, appending to the child-test list and
    /// the unified entry list.
    pub fn add_test(&mut self, parent: SuiteId, test: TestId) -> TreeResult<()> {
        self.check_attachable(parent, test.into())?;
        self.tests[test.0].state.set_parent(parent);
        let node = &mut self.suites[parent.0];
        node.tests.push(test);
        node.entries.push(test.into());
        Ok(())
    }

    fn check_attachable(&self, parent: SuiteId, child: NodeId) -> TreeResult<()> {
        let state = self.state_of(child);
        if state.parent().is_some() {
            return Err(TreeError::AlreadyAttached {
                child: state.title().to_string(),
            });
        }
        if let NodeId::Suite(child) = child {
            // a cyclic parent chain would hang every inherited query
            let mut cursor = Some(parent);
            while let Some(suite) = cursor {
                if suite == child {
                    return Err(TreeError::WouldCycle {
                        child: self.suites[child.0].state.title().to_string(),
                        parent: self.suites[parent.0].state.title().to_string(),
                    });
                }
                cursor = self.suites[suite.0].state.parent();
            }
        }
        Ok(())
    }

    /// Register a lifecycle hook on `suite`, preserving registration order.
    pub fn add_hook(&mut self, suite: SuiteId, kind: HookKind, body: HookBody) {
        self.suites[suite.0].hooks.push(Hook { kind, body });
    }

    fn state_of(&self, node: NodeId) -> &RunnableState {
        match node {
            NodeId::Suite(id) => &self.suites[id.0].state,
            NodeId::Test(id) => &self.tests[id.0].state,
        }
    }

    /// The node's state followed by each ancestor's, nearest first.
    fn chain(&self, node: NodeId) -> impl Iterator<Item = &RunnableState> + '_ {
        iter::successors(Some(node), |current| {
            self.state_of(*current).parent().map(NodeId::Suite)
        })
        .map(|current| self.state_of(current))
    }

    /// True if this node or any ancestor carries the skip flag.
    ///
    /// The walk happens at query time, so a modifier applied to a suite
    /// after its children were registered still affects them.
    pub fn is_skipped(&self, node: impl Into<NodeId>) -> bool {
        self.chain(node.into()).any(RunnableState::skipped_self)
    }

    /// True if this node or any ancestor is marked slow.
    pub fn is_slow(&self, node: impl Into<NodeId>) -> bool {
        self.chain(node.into()).any(RunnableState::slow_self)
    }

    /// True if this node or any ancestor is marked flaky.
    pub fn is_flaky(&self, node: impl Into<NodeId>) -> bool {
        self.chain(node.into()).any(RunnableState::flaky_self)
    }

    /// The expectation declared nearest to the node wins; with no explicit
    /// declaration anywhere on the chain the expectation is passed.
    pub fn expected_status(&self, node: impl Into<NodeId>) -> TestStatus {
        self.chain(node.into())
            .find_map(RunnableState::expected_status_self)
            .unwrap_or(TestStatus::Passed)
    }

    /// The annotation history visible from this node: its own records in
    /// application order, then each ancestor's, nearest ancestor first.
    /// Recomputed on every call, never cached.
    pub fn annotations(&self, node: impl Into<NodeId>) -> Vec<Annotation> {
        self.chain(node.into())
            .flat_map(|state| state.annotations().iter().cloned())
            .collect()
    }

    /// Depth-first search over every test under `root`, visiting each
    /// subtree's child suites before its direct tests. Stops at the first
    /// test for which `f` returns true and reports whether one was found.
    ///
    /// Doubles as the for-each primitive behind [`all_tests`](Self::all_tests),
    /// renumbering, and [`has_tests_to_run`](Self::has_tests_to_run): a
    /// predicate that always returns false visits every test.
    pub fn find_test<F>(&self, root: SuiteId, mut f: F) -> bool
    where
        F: FnMut(TestId) -> bool,
    {
        self.find_test_inner(root, &mut f)
    }

    fn find_test_inner(&self, suite: SuiteId, f: &mut dyn FnMut(TestId) -> bool) -> bool {
        for &child in &self.suites[suite.0].suites {
            if self.find_test_inner(child, f) {
                return true;
            }
        }
        for &test in &self.suites[suite.0].tests {
            if f(test) {
                return true;
            }
        }
        false
    }

    /// Every test under `root`, in [`find_test`](Self::find_test) order.
    pub fn all_tests(&self, root: SuiteId) -> Vec<TestId> {
        let mut tests = Vec::new();
        self.find_test(root, |test| {
            tests.push(test);
            false
        });
        tests
    }

    /// Assign ordinals `0..k-1` to every test under `root` in traversal
    /// order. Run once per root after the file's tree is fully built;
    /// mutating the tree afterwards leaves ordinals stale.
    pub fn renumber(&mut self, root: SuiteId) {
        let order = self.all_tests(root);
        for (ordinal, test) in order.iter().enumerate() {
            self.tests[test.0].state.set_ordinal(ordinal);
        }
        debug!(
            root = %self.suites[root.0].state.title(),
            tests = order.len(),
            "renumbered suite tree"
        );
    }

    /// Assign every test under `root` its stable identity string,
    /// `"{ordinal}@{file}::[{configuration_key}]"`. `file` comes from the
    /// root suite, not from each test's own provenance. Reporting and
    /// re-run-by-id features depend on this exact format.
    ///
    /// Requires [`renumber`](Self::renumber) to have run on this root.
    pub fn assign_ids(&mut self, root: SuiteId, configuration_key: &str) -> TreeResult<()> {
        let root_title = self.suites[root.0].state.title().to_string();
        let file = self.suites[root.0].state.file().to_string();
        for test in self.all_tests(root) {
            let state = &mut self.tests[test.0].state;
            let ordinal = state.ordinal().ok_or_else(|| TreeError::NotRenumbered {
                root: root_title.clone(),
            })?;
            state.set_id(format!("{}@{}::[{}]", ordinal, file, configuration_key));
        }
        debug!(%file, configuration_key, "assigned test ids");
        Ok(())
    }

    /// True if at least one test under `root` is not skipped, directly or by
    /// inheritance. Short-circuits on the first runnable test.
    pub fn has_tests_to_run(&self, root: SuiteId) -> bool {
        self.find_test(root, |test| !self.is_skipped(test))
    }
}

impl Index<SuiteId> for SuiteTree {
    type Output = SuiteNode;

    fn index(&self, id: SuiteId) -> &SuiteNode {
        &self.suites[id.0]
    }
}

impl IndexMut<SuiteId> for SuiteTree {
    fn index_mut(&mut self, id: SuiteId) -> &mut SuiteNode {
        &mut self.suites[id.0]
    }
}

impl Index<TestId> for SuiteTree {
    type Output = TestNode;

    fn index(&self, id: TestId) -> &TestNode {
        &self.tests[id.0]
    }
}

impl IndexMut<TestId> for SuiteTree {
    fn index_mut(&mut self, id: TestId) -> &mut TestNode {
        &mut self.tests[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::ModifierKind;

    fn noop() -> TestBody {
        Arc::new(|| {})
    }

    /// root
    ///   ├─ "first"        (test)
    ///   ├─ "inner"        (suite)
    ///   │    └─ "nested"  (test)
    ///   └─ "last"         (test)
    fn sample_tree() -> (SuiteTree, SuiteId, SuiteId, [TestId; 3]) {
        let mut tree = SuiteTree::new();
        let root = tree.create_suite("sample.spec");
        tree[root].state_mut().set_source("sample.spec", "sample.spec:1:1");

        let first = tree.create_test("first", noop());
        tree.add_test(root, first).unwrap();

        let inner = tree.create_suite("inner");
        tree.add_suite(root, inner).unwrap();
        let nested = tree.create_test("nested", noop());
        tree.add_test(inner, nested).unwrap();

        let last = tree.create_test("last", noop());
        tree.add_test(root, last).unwrap();

        (tree, root, inner, [first, nested, last])
    }

    #[test]
    fn test_attachment_sets_parent_and_orders() {
        let (tree, root, inner, [first, nested, last]) = sample_tree();

        assert_eq!(tree[first].state().parent(), Some(root));
        assert_eq!(tree[nested].state().parent(), Some(inner));
        assert_eq!(tree[inner].state().parent(), Some(root));
        assert_eq!(tree[root].state().parent(), None);

        // entries keep declaration order, interleaved
        assert_eq!(
            tree[root].entries(),
            &[
                NodeId::Test(first),
                NodeId::Suite(inner),
                NodeId::Test(last)
            ]
        );
        // typed projections keep their own order
        assert_eq!(tree[root].tests(), &[first, last]);
        assert_eq!(tree[root].suites(), &[inner]);
    }

    #[test]
    fn test_traversal_is_suites_before_tests() {
        let (tree, root, _, [first, nested, last]) = sample_tree();
        // "inner" was declared between "first" and "last", but its test is
        // visited first because each subtree walks suites before tests
        assert_eq!(tree.all_tests(root), vec![nested, first, last]);
    }

    #[test]
    fn test_find_test_short_circuits() {
        let (tree, root, _, [_, nested, _]) = sample_tree();
        let mut visited = Vec::new();
        let found = tree.find_test(root, |test| {
            visited.push(test);
            true
        });
        assert!(found);
        assert_eq!(visited, vec![nested]);
    }

    #[test]
    fn test_renumber_assigns_consecutive_ordinals() {
        let (mut tree, root, _, [first, nested, last]) = sample_tree();
        tree.renumber(root);

        assert_eq!(tree[nested].state().ordinal(), Some(0));
        assert_eq!(tree[first].state().ordinal(), Some(1));
        assert_eq!(tree[last].state().ordinal(), Some(2));
    }

    #[test]
    fn test_assign_ids_uses_root_file_and_exact_format() {
        let (mut tree, root, _, [first, nested, last]) = sample_tree();
        tree.renumber(root);
        tree.assign_ids(root, "chromium").unwrap();

        assert_eq!(tree[nested].state().id(), Some("0@sample.spec::[chromium]"));
        assert_eq!(tree[first].state().id(), Some("1@sample.spec::[chromium]"));
        assert_eq!(tree[last].state().id(), Some("2@sample.spec::[chromium]"));
    }

    #[test]
    fn test_assign_ids_before_renumber_is_reported() {
        let (mut tree, root, _, _) = sample_tree();
        let err = tree.assign_ids(root, "chromium").unwrap_err();
        assert!(matches!(err, TreeError::NotRenumbered { .. }));
    }

    #[test]
    fn test_double_attachment_is_reported() {
        let (mut tree, root, inner, [first, ..]) = sample_tree();
        assert!(matches!(
            tree.add_test(inner, first),
            Err(TreeError::AlreadyAttached { .. })
        ));
        assert!(matches!(
            tree.add_suite(root, inner),
            Err(TreeError::AlreadyAttached { .. })
        ));
    }

    #[test]
    fn test_cyclic_attachment_is_reported() {
        let mut tree = SuiteTree::new();
        let outer = tree.create_suite("outer");
        let mid = tree.create_suite("mid");
        tree.add_suite(outer, mid).unwrap();

        // "outer" is unparented, but hanging it under its own subtree would
        // loop the parent chain
        assert!(matches!(
            tree.add_suite(mid, outer),
            Err(TreeError::WouldCycle { .. })
        ));
    }

    #[test]
    fn test_inherited_flags_or_over_the_chain() {
        let (mut tree, root, inner, [first, nested, _]) = sample_tree();
        tree[inner].slow(());
        tree[root].flaky("infra");

        assert!(tree.is_slow(nested));
        assert!(!tree.is_slow(first));
        assert!(tree.is_flaky(nested));
        assert!(tree.is_flaky(first));
        assert!(tree.is_flaky(inner));
    }

    #[test]
    fn test_expected_status_defaults_to_passed() {
        let (mut tree, root, inner, [first, nested, _]) = sample_tree();
        assert_eq!(tree.expected_status(nested), TestStatus::Passed);

        tree[inner].fail("known issue");
        assert_eq!(tree.expected_status(nested), TestStatus::Failed);
        assert_eq!(tree.expected_status(first), TestStatus::Passed);
        assert_eq!(tree.expected_status(root), TestStatus::Passed);
    }

    #[test]
    fn test_annotations_collect_nearest_first() {
        let (mut tree, root, inner, [_, nested, _]) = sample_tree();
        tree[root].flaky("infra");
        tree[inner].slow(());
        tree[nested].skip("quarantined");

        let kinds: Vec<_> = tree.annotations(nested).iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![ModifierKind::Skip, ModifierKind::Slow, ModifierKind::Flaky]
        );
    }

    #[test]
    fn test_has_tests_to_run() {
        let (mut tree, root, inner, [first, _, last]) = sample_tree();
        assert!(tree.has_tests_to_run(root));

        tree[inner].skip(());
        assert!(tree.has_tests_to_run(root));

        tree[first].skip(());
        tree[last].fixme("broken everywhere");
        assert!(!tree.has_tests_to_run(root));
    }

    #[test]
    fn test_hooks_preserve_registration_order() {
        let mut tree = SuiteTree::new();
        let root = tree.create_suite("hooks.spec");
        tree.add_hook(root, HookKind::BeforeEach, Arc::new(|| {}));
        tree.add_hook(root, HookKind::BeforeAll, Arc::new(|| {}));
        tree.add_hook(root, HookKind::BeforeEach, Arc::new(|| {}));

        let kinds: Vec<_> = tree[root].hooks().iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![HookKind::BeforeEach, HookKind::BeforeAll, HookKind::BeforeEach]
        );
    }

    #[test]
    fn test_results_and_timeout_override() {
        let mut tree = SuiteTree::new();
        let root = tree.create_suite("r");
        let test = tree.create_test("t", noop());
        tree.add_test(root, test).unwrap();

        tree[test].push_result(TestResult::failed(Duration::from_millis(80), "boom"));
        tree[test].push_result(TestResult::passed(Duration::from_millis(60)));
        assert_eq!(tree[test].results().len(), 2);
        assert_eq!(tree[test].results()[1].status, TestStatus::Passed);

        assert_eq!(
            tree[test].timeout_or(Duration::from_secs(30)),
            Duration::from_secs(30)
        );
        tree[test].set_timeout(Duration::from_secs(5));
        assert_eq!(
            tree[test].timeout_or(Duration::from_secs(30)),
            Duration::from_secs(5)
        );
    }
}
