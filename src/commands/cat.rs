//! `cat`: stream remote files to each host's output.

use clap::Parser;

use super::{parse_flags, CommandOutcome, CommandResult, ShellContext};
use crate::dispatch::{copy_to_writer, expand_operand, fan_out, HostReport};
use crate::error::ShellError;

#[derive(Parser, Debug)]
#[command(disable_help_flag = true)]
struct CatArgs {
    targets: Vec<String>,
}

pub(super) async fn run(ctx: &ShellContext, args: Vec<String>) -> CommandResult {
    let parsed: CatArgs = parse_flags(&args)?;
    if parsed.targets.is_empty() {
        return Err(ShellError::Usage("usage: cat [host,...:]path...".into()));
    }
    let targets = ctx.resolve(&parsed.targets);
    fan_out(targets, |target, mut out| async move {
        let mut report = HostReport::<()>::new();
        for raw in &target.paths {
            let Some(matches) = report.record(&mut out, expand_operand(&target.session, raw).await)
            else {
                continue;
            };
            for path in matches {
                let result = copy_to_writer(&target.session, &path, &mut out).await;
                report.record(&mut out, result);
            }
        }
        report
    })
    .await;
    Ok(CommandOutcome::Continue)
}
