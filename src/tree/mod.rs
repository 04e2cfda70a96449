pub mod builder;
pub mod listing;
pub mod node;

pub use builder::{CancelFlag, TraversalError, TreeLimits};
pub use listing::{FileTree, TreeConfig};
pub use node::TreeNode;
