pub mod depth;
pub mod error;
pub mod flat;
pub mod format;
pub mod id;
pub mod model;
pub mod mutate;
pub mod validate;

pub use depth::{MAX_DEPTH, VisibleRow, depth, subtree_height, visible_rows};
pub use error::{TreeError, TreeResult};
pub use flat::{FlatItem, FlatTree, FlattenConfig, flatten, flatten_with, unflatten};
pub use format::{FormatConfig, format_text, parse_tree, stringify_tree};
pub use id::NodeId;
pub use model::*;
pub use mutate::{TreeDestinationPosition, TreeSourcePosition, move_item, set_expansion};
pub use validate::{check_tree, tree_from_value};
