use anyhow::Result;
use log::info;

use crate::{cli::PreviewArgs, commands::load_input, table};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let (input, _) = load_input(&args.input)?;
    print!("{}", table::render_frame(&input, Some(args.rows)));
    let types = input
        .columns()
        .iter()
        .map(|c| format!("{}: {}", c.name, c.data_type))
        .collect::<Vec<_>>();
    info!(
        "Displayed {} of {} row(s) from {:?} ({})",
        args.rows.min(input.row_count()),
        input.row_count(),
        args.input.input,
        types.join(", ")
    );
    Ok(())
}
