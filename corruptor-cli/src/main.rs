use clap::Parser;
use std::path::PathBuf;
use std::process;

use corruptor_core::{
    run, CorruptorError, CorruptorSettings, MutationRates, WadKind, DEFAULT_SPECIALS_PATH,
};

const EXIT_FORMAT: i32 = 1;
const EXIT_NOT_FOUND: i32 = 2;
const EXIT_USAGE: i32 = 255;

fn parse_probability(arg: &str) -> Result<f64, String> {
    let prob: f64 = arg
        .parse()
        .map_err(|_| format!("cannot parse probability {arg:?} as a floating-point value"))?;
    if (0.0..=1.0).contains(&prob) {
        Ok(prob)
    } else {
        Err("probability must be between 0 and 1, inclusive".to_string())
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "wad-corruptor",
    version,
    about = "Randomise sector and linedef tags and specials in a WAD",
    after_help = "All probabilities are zero by default. Specifying no options makes no changes."
)]
struct Args {
    /// WAD to read.
    input: PathBuf,

    /// WAD to write.
    output: PathBuf,

    /// Randomise linedef tags.
    #[arg(short = 'l', long)]
    linedef_tags: bool,

    /// Randomise sector tags.
    #[arg(short = 's', long)]
    sector_tags: bool,

    /// Probability of randomising a linedef's tag (overrides -l).
    #[arg(long, value_name = "PROB", value_parser = parse_probability)]
    linedef_tag_prob: Option<f64>,

    /// Probability of randomising a sector's tag (overrides -s).
    #[arg(long, value_name = "PROB", value_parser = parse_probability)]
    sector_tag_prob: Option<f64>,

    /// Seed for the random number generator.
    #[arg(short = 'n', long)]
    seed: Option<u64>,

    /// Probability of randomising a linedef's special.
    #[arg(short = 'L', long, value_name = "PROB", default_value_t = 0.0, value_parser = parse_probability)]
    linedef_special_prob: f64,

    /// Probability of randomising a sector's special.
    #[arg(short = 'S', long, value_name = "PROB", default_value_t = 0.0, value_parser = parse_probability)]
    sector_special_prob: f64,

    /// Probability of changing the tag of a linedef or sector with tag 0.
    #[arg(short = '0', long, value_name = "PROB", default_value_t = 0.0, value_parser = parse_probability)]
    zero_tag_prob: f64,

    /// Probability that a linedef with special 0 may receive a special.
    #[arg(long, value_name = "PROB", default_value_t = 1.0, value_parser = parse_probability)]
    special_zero_prob: f64,

    /// Linedef special pool, one number per line. A missing file exits with
    /// the configuration status (255), not the missing-input status (2).
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SPECIALS_PATH)]
    specials: PathBuf,

    /// Write the output with an IWAD header instead of PWAD.
    #[arg(long)]
    iwad: bool,

    /// Write a JSON summary of the changes made.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_settings(self) -> CorruptorSettings {
        let tag_prob = |prob: Option<f64>, flag: bool| prob.unwrap_or(if flag { 1.0 } else { 0.0 });

        CorruptorSettings {
            seed: self.seed,
            rates: MutationRates {
                sector_tag_prob: tag_prob(self.sector_tag_prob, self.sector_tags),
                linedef_tag_prob: tag_prob(self.linedef_tag_prob, self.linedef_tags),
                apply_to_zero_prob: self.zero_tag_prob,
                sector_special_prob: self.sector_special_prob,
                linedef_special_prob: self.linedef_special_prob,
                special_zero_prob: self.special_zero_prob,
            },
            specials_path: Some(self.specials),
            output_magic: if self.iwad { WadKind::Iwad } else { WadKind::Pwad },
            report_path: self.report,
            input_path: self.input,
            output_path: self.output,
        }
    }
}

fn exit_code(err: &CorruptorError) -> i32 {
    match err {
        CorruptorError::NotFound { .. } => EXIT_NOT_FOUND,
        CorruptorError::Format { .. } => EXIT_FORMAT,
        CorruptorError::Config(_) | CorruptorError::SpecialsNotFound { .. } => EXIT_USAGE,
        _ => 1,
    }
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            process::exit(EXIT_USAGE);
        }
        // --help and --version
        Err(e) => e.exit(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = args.into_settings();
    if let Err(err) = run(settings) {
        tracing::error!("{err}");
        process::exit(exit_code(&err));
    }
}
