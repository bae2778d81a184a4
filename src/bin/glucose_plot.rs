use anyhow::{bail, Context};
use glucose_lpp::chart::render_svg;
use glucose_lpp::plot::parse_cli;
use glucose_lpp::read_year_segments;
use log::{error, info};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_cli()?;
    info!(
        "read data from {} and plot to {}",
        args.csvin.display(),
        args.outdir.display()
    );
    let segments = read_year_segments(&args.csvin, &args.columns, &args.segmentation)
        .with_context(|| format!("could not load {}", args.csvin.display()))?;
    std::fs::create_dir_all(&args.outdir)
        .with_context(|| format!("could not create {}", args.outdir.display()))?;

    let filter = args.filter.build()?;
    info!("filter: {}", filter.name());

    // one failing year does not stop the others
    let mut failed = Vec::new();
    for segment in segments.iter() {
        let filtered = filter.apply(&segment.data);
        let svgout = args.svgout(&segment.label);
        if let Err(e) = render_svg(
            &svgout,
            args.size,
            &filtered,
            &segment.label,
            args.window.clone(),
        ) {
            error!("could not plot {}: {}", segment.label, e);
            failed.push(segment.label.as_str());
        }
    }
    if !failed.is_empty() {
        bail!(
            "{} of {} charts failed: {}",
            failed.len(),
            segments.len(),
            failed.join(", ")
        );
    }
    Ok(())
}
