//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads spectra and line lists
//! - runs the measurement pipeline
//! - prints reports
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, ConfigArgs, MeasureArgs, QueryArgs, SynthArgs};
use crate::data::SyntheticLamp;
use crate::domain::{Position, ProfileConfig};
use crate::error::AppError;
use crate::profile::KernelOptions;

pub mod pipeline;

/// Entry point for the `instprofile` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Measure(args) => handle_measure(args),
        Command::Query(args) => handle_query(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_measure(args: MeasureArgs) -> Result<(), AppError> {
    let config = profile_config_from_args(&args.config);
    let spectrum = crate::io::read_spectrum(&args.spectrum)?;
    let references = crate::io::read_reference_lines(&args.lines)?;

    let run = pipeline::run_profile(&spectrum, &references, &config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.report, &run.profile, &config)
    );
    if args.table {
        println!("{}", crate::report::format_line_table(&run.matches.matched, &run.dispersion));
    }

    if let Some(path) = &args.export_lines {
        crate::io::write_matched_lines_csv(path, &run.matches.matched, &run.dispersion)?;
    }
    if let Some(path) = &args.export_profile {
        let file = crate::io::ProfileFile::new(&config, &run.profile, &run.matches.matched, &run.report)?;
        crate::io::write_profile_json(path, &file)?;
    }

    Ok(())
}

fn handle_query(args: QueryArgs) -> Result<(), AppError> {
    let file = crate::io::read_profile_json(&args.profile)?;
    let position = match (args.pixel, args.wavelength) {
        (Some(x), _) => Position::Pixel(x),
        (None, Some(l)) => Position::Wavelength(l),
        (None, None) => return Err(AppError::new(2, "Either --pixel or --wavelength is required.")),
    };

    let value = file.profile.width_at(position)?;
    let kernel = if args.kernel {
        let options = KernelOptions {
            half_extent_fwhm: args.half_extent,
            samples_per_fwhm: args.samples_per_fwhm,
        };
        Some(file.profile.kernel_at(position, file.profile.options().shape, &options)?)
    } else {
        None
    };

    print!(
        "{}",
        crate::report::format_query(position, value, file.profile.measure(), kernel.as_ref())
    );
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let lamp = SyntheticLamp::widening(args.seed, args.noise);
    let synthetic = lamp.render(args.seed.wrapping_add(1))?;

    let lines_out = args
        .lines_out
        .clone()
        .unwrap_or_else(|| args.out.with_extension("lines.csv"));
    crate::io::write_spectrum_csv(&args.out, &synthetic.spectrum)?;
    crate::io::write_reference_lines_csv(&lines_out, &synthetic.references)?;

    log::info!(
        "wrote {} samples to {} and {} lines to {}",
        synthetic.spectrum.len(),
        args.out.display(),
        synthetic.references.len(),
        lines_out.display()
    );
    Ok(())
}

pub fn profile_config_from_args(args: &ConfigArgs) -> ProfileConfig {
    ProfileConfig {
        shape_model: args.shape,
        voigt_fraction: args.voigt_fraction,
        min_separation: args.min_separation,
        detection_threshold: args.threshold,
        region_fraction: args.region_fraction,
        max_iterations: args.max_iterations,
        fit_quality_threshold: args.quality_threshold,
        max_width: args.max_width,
        center_tolerance: args.center_tolerance,
        dispersion: args.dispersion,
        dispersion_offset: args.dispersion_offset,
        dispersion_slope: args.dispersion_slope,
        anchor_lines: args.anchor_lines,
        match_tolerance: args.match_tolerance,
        interpolation: args.interpolation,
        extrapolation_policy: args.extrapolation,
        measure: args.measure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn default_flags_give_default_config() {
        let cli = Cli::try_parse_from(["instprofile", "measure", "--spectrum", "s", "--lines", "l"]).unwrap();
        let Command::Measure(args) = cli.command else {
            panic!("expected measure");
        };
        assert_eq!(profile_config_from_args(&args.config), ProfileConfig::default());
    }
}
