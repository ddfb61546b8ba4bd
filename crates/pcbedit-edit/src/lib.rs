pub mod anchor;
pub mod clipboard;
pub mod command;
pub mod config;
pub mod error;
pub mod history;
pub mod paste;
pub mod remove;
pub mod splitter;
pub mod transaction;

// Re-export commonly used types
pub use anchor::{AnchorResolver, MissingAnchorPolicy, PlaceholderTable, Resolution};
pub use clipboard::{ClipboardData, ClipboardDataBuilder, ClipboardSegment};
pub use command::{apply_command, apply_mutation, EditCommand, Mutation};
pub use config::{ConfigError, EditConfig};
pub use error::EditError;
pub use history::UndoStack;
pub use paste::{paste_board_items, PasteReport};
pub use remove::{remove_board_items, Selection};
pub use splitter::{NetSegmentSplitter, SplitSegment};
pub use transaction::{CommandGroup, CommittedEdit, EditOutcome, GroupState, Transaction};
