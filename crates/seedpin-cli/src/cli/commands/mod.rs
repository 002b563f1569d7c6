//! CLI command handlers. Each command is in its own file.

mod add;
mod configure;
mod control;
mod list;
mod objects;
mod remove;
mod run;
mod search;

pub use add::run_add;
pub use configure::{run_configure, run_hide, run_ignore};
pub use control::{run_cancel, run_restart};
pub(crate) use control::queue_for_next_run;
pub use list::run_list;
pub use objects::run_objects;
pub use remove::run_remove;
pub use run::run_engine;
pub use search::run_search;
