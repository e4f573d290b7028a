use crate::cli::{Cli, Command};

pub(crate) fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.cmd {
        Command::Inspect { path } => crate::commands::inspect::cmd_inspect(&path, cli.json),
        Command::Features {
            path,
            from,
            limit,
            bbox,
            fields,
        } => crate::commands::features::cmd_features(
            &path,
            from,
            limit,
            bbox.as_deref(),
            &fields,
            cli.json,
        ),
        Command::Get { path, id, fields } => {
            crate::commands::get::cmd_get(&path, id, &fields, cli.json)
        }
        Command::Remove { path, id } => crate::commands::remove::cmd_remove(&path, id, cli.json),
    }
}
