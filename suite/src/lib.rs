pub mod modifier;
pub mod runnable;
pub mod tree;

pub use modifier::{Annotation, ModifierArg, ModifierKind};
pub use runnable::{Runnable, RunnableState};
pub use tree::{
    Hook, HookBody, NodeId, SuiteId, SuiteNode, SuiteTree, TestBody, TestId, TestNode, TreeError,
    TreeResult,
};
