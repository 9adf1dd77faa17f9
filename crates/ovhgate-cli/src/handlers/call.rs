//! Call command handler

use crate::cli::CallArgs;
use crate::config::Config;
use crate::error::Result;
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use tracing::{info, instrument};

/// Run one tool and print its result
#[instrument(skip_all, fields(tool = %args.tool))]
pub async fn handle_call(args: CallArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let timer = Timer::with_details("call_command", &args.tool);

    let arguments = super::parse_json_arg("args", args.args.as_deref())?;
    let dispatcher = super::build_dispatcher(config)?;

    let spinner = output.spinner(&format!("Calling {}...", args.tool));
    let result = dispatcher
        .call_with_token(&args.tool, &arguments, args.token)
        .await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let tool_output = result?;
    info!(status = tool_output.status, "Tool call succeeded");
    output.tool_output(&tool_output)?;

    timer.finish();
    Ok(())
}
