//! Stack loading: template expansion, parsing, local overrides, validation

use crate::error::Result;
use crate::model::Stack;
use crate::parser::{apply_document, default_stack_name, parse_kdl_string};
use crate::template::TemplateProcessor;
use kdl::KdlDocument;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Local override file merged on top of the main stack file
pub const LOCAL_OVERRIDE_FILE: &str = "stack.local.kdl";

/// Read, expand, parse and validate a stack file
#[tracing::instrument]
pub fn load_stack(path: &Path) -> Result<Stack> {
    let mut processor = template_processor(path)?;
    let stack = load_with(&mut processor, path)?;
    stack.validate()?;
    Ok(stack)
}

/// Like [`load_stack`], but merges a sibling `stack.local.kdl` first
#[tracing::instrument]
pub fn load_stack_with_overrides(path: &Path) -> Result<Stack> {
    let mut processor = template_processor(path)?;
    let mut stack = load_with(&mut processor, path)?;

    if let Some(local) = local_override_for(path) {
        info!(file = %local.display(), "Applying local overrides");
        let rendered = processor.render_file(&local)?;
        let doc: KdlDocument = rendered.parse()?;
        apply_document(&mut stack, &doc)?;
    }

    stack.validate()?;
    Ok(stack)
}

fn template_processor(path: &Path) -> Result<TemplateProcessor> {
    let mut processor = TemplateProcessor::new();
    processor.add_env_variables();

    let env_file = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(".env");
    if env_file.is_file() {
        processor.add_env_file_variables(&env_file)?;
    }
    Ok(processor)
}

fn load_with(processor: &mut TemplateProcessor, path: &Path) -> Result<Stack> {
    let rendered = processor.render_file(path)?;
    debug!(file = %path.display(), bytes = rendered.len(), "Rendered stack file");
    parse_kdl_string(&rendered, default_stack_name(path))
}

/// Sibling override file, unless `path` is the override itself
fn local_override_for(path: &Path) -> Option<PathBuf> {
    let local = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(LOCAL_OVERRIDE_FILE);
    let is_self = path.file_name().is_some_and(|n| n == LOCAL_OVERRIDE_FILE);
    (!is_self && local.is_file()).then_some(local)
}
