mod command;
mod runner;
mod util;

pub use command::Command;
pub use runner::run;
pub use util::{parse_project_arg, parse_sort_arg, render_array, render_doc, render_opt};
