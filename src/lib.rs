#[macro_export]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		#[cfg(debug_assertions)]
		{
			eprintln!($($arg)*);
		}
	}};
}

pub mod config;
pub mod error;
pub mod position;
pub mod cache;
pub mod decls;
pub mod scope;
pub mod intel;
pub mod references;
pub mod formatter;
pub mod scanner;
pub mod module;
pub mod target;
pub mod inspector;
pub mod server;

pub use cache::{ParseCache, SourceFile};
pub use error::{InspectError, Result};
pub use inspector::Inspector;
pub use intel::{CodeIntel, GoplsCli};
