//! Cumulus core
//!
//! Typed model of an Azure scale-set stack, the KDL parser that builds it,
//! Tera-based template expansion and validation.

pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod template;
pub mod validate;

pub use error::{Result, StackError};
pub use loader::{LOCAL_OVERRIDE_FILE, load_stack, load_stack_with_overrides};
pub use model::*;
pub use parser::{apply_document, parse_kdl_file, parse_kdl_string};
pub use template::{TemplateProcessor, Variables};
pub use validate::Ipv4Cidr;
