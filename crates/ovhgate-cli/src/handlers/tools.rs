//! Tools command handler

use crate::cli::ToolsArgs;
use crate::error::Result;
use crate::output::OutputWriter;
use ovhgate_core::tools::{catalog, ToolError};

/// List the catalog, or describe one tool
pub fn handle_tools(args: ToolsArgs, output: &mut OutputWriter) -> Result<()> {
    match args.name {
        Some(name) => {
            let tool = catalog::find(&name).ok_or_else(|| ToolError::unknown_tool(&name))?;
            output.tool(tool)
        }
        None => {
            output.section("Tools")?;
            output.tool_list(catalog::catalog())
        }
    }
}
