use super::chart::{DEFAULT_SIZE, DEFAULT_WINDOW};
use super::filter::FilterKind;
use super::segment::Segmentation;
use super::{
    Columns, GlucoseError, Result, DEFAULT_CSVFILE, DEFAULT_GLUCOSE_COLUMN, DEFAULT_TIME_COLUMN,
    VERSION,
};
use clap::{App, Arg, ArgMatches};
use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;

/// Settings for one run of glucose_plot
#[derive(Debug, Clone, PartialEq)]
pub struct PlotArgs {
    pub csvin: PathBuf,
    pub outdir: PathBuf,
    pub columns: Columns,
    pub window: Range<usize>,
    pub segmentation: Segmentation,
    pub filter: FilterKind,
    pub size: (u32, u32),
}

impl PlotArgs {
    pub fn svgout(&self, label: &str) -> PathBuf {
        self.outdir.join(format!("glucose_{}.svg", label))
    }
}

fn cli_app<'a, 'b>() -> App<'a, 'b> {
    let arg_csvin = Arg::with_name("input_csvfile")
        .help("name of the glucose export csv file")
        .short("f")
        .long("csvfile")
        .takes_value(true)
        .default_value(DEFAULT_CSVFILE);
    let arg_outdir = Arg::with_name("outdir")
        .help("directory for the output svg files, one per year")
        .short("o")
        .long("outdir")
        .takes_value(true)
        .default_value(".");
    let arg_start = Arg::with_name("start")
        .help("first row of each year to plot")
        .long("start")
        .takes_value(true)
        .default_value("0");
    let arg_end = Arg::with_name("end")
        .help("row after the last one to plot for each year")
        .long("end")
        .takes_value(true)
        .default_value("500");
    let arg_by_year = Arg::with_name("by_year")
        .help("split the years by timestamp instead of the fixed row ranges")
        .long("by-year")
        .takes_value(false);
    let arg_filter = Arg::with_name("filter")
        .help("filter applied to each year before plotting")
        .long("filter")
        .takes_value(true)
        .possible_values(&FilterKind::NAMES)
        .default_value("none");
    let arg_side = Arg::with_name("side_length")
        .help("number of readings on each side for the moving average window")
        .short("s")
        .long("side")
        .takes_value(true)
        .default_value("4");
    let arg_cutoff = Arg::with_name("cutoff")
        .help("butterworth cutoff frequency, in cycles per reading")
        .long("cutoff")
        .takes_value(true)
        .default_value("0.1");
    let arg_time_column = Arg::with_name("time_column")
        .help("header of the timestamp column")
        .long("time-column")
        .takes_value(true)
        .default_value(DEFAULT_TIME_COLUMN);
    let arg_glucose_column = Arg::with_name("glucose_column")
        .help("header of the glucose column, mmol/L")
        .long("glucose-column")
        .takes_value(true)
        .default_value(DEFAULT_GLUCOSE_COLUMN);
    let arg_width = Arg::with_name("width")
        .help("width of the svg in pixels")
        .long("width")
        .takes_value(true)
        .default_value("1400");
    let arg_height = Arg::with_name("height")
        .help("height of the svg in pixels")
        .long("height")
        .takes_value(true)
        .default_value("600");
    App::new("Glucose_plot")
        .version(VERSION.unwrap_or("unknown"))
        .author("Luca Peruzzo")
        .about("cli app to plot the glucose time series, one chart per year")
        .arg(arg_csvin)
        .arg(arg_outdir)
        .arg(arg_start)
        .arg(arg_end)
        .arg(arg_by_year)
        .arg(arg_filter)
        .arg(arg_side)
        .arg(arg_cutoff)
        .arg(arg_time_column)
        .arg(arg_glucose_column)
        .arg(arg_width)
        .arg(arg_height)
}

fn parse_value<T: FromStr>(cli_args: &ArgMatches, name: &str) -> Result<T> {
    let raw = cli_args.value_of(name).unwrap_or_default();
    raw.parse::<T>().map_err(|_| {
        GlucoseError::InvalidArgument(format!("could not parse {} from '{}'", name, raw))
    })
}

fn value_string(cli_args: &ArgMatches, name: &str) -> String {
    cli_args.value_of(name).unwrap_or_default().to_string()
}

/// Takes the CLI arguments that control the loading, filtering, and plotting.
pub fn parse_cli() -> Result<PlotArgs> {
    parse_args(std::env::args_os())
}

pub fn parse_args<I, T>(args: I) -> Result<PlotArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli_args = cli_app().get_matches_from(args);
    let start: usize = parse_value(&cli_args, "start")?;
    let end: usize = parse_value(&cli_args, "end")?;
    let window = start..end;
    let segmentation = if cli_args.is_present("by_year") {
        Segmentation::CalendarYear
    } else {
        Segmentation::default()
    };
    let filter = FilterKind::from_name(
        cli_args.value_of("filter").unwrap_or("none"),
        parse_value(&cli_args, "side_length")?,
        parse_value(&cli_args, "cutoff")?,
    )?;
    let size = (
        parse_value::<u32>(&cli_args, "width")?,
        parse_value::<u32>(&cli_args, "height")?,
    );
    if size.0 == 0 || size.1 == 0 {
        return Err(GlucoseError::InvalidArgument(format!(
            "svg size must be positive, got {}x{}",
            size.0, size.1
        )));
    }
    Ok(PlotArgs {
        csvin: PathBuf::from(value_string(&cli_args, "input_csvfile")),
        outdir: PathBuf::from(value_string(&cli_args, "outdir")),
        columns: Columns {
            time: value_string(&cli_args, "time_column"),
            glucose: value_string(&cli_args, "glucose_column"),
        },
        window,
        segmentation,
        filter,
        size,
    })
}

impl Default for PlotArgs {
    fn default() -> Self {
        PlotArgs {
            csvin: PathBuf::from(DEFAULT_CSVFILE),
            outdir: PathBuf::from("."),
            columns: Columns::default(),
            window: DEFAULT_WINDOW,
            segmentation: Segmentation::default(),
            filter: FilterKind::None,
            size: DEFAULT_SIZE,
        }
    }
}
