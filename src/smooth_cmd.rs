//! Smooth command: filter and smooth a series described by a TOML run file.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use kalmar_ssf::{
    DiffuseLikelihood, DiffuseSquareRootSmoother, FilterOutput, SmoothedStates, SsfData, toolkit,
};

use crate::cli::SmoothArgs;
use crate::config::RunConfig;
use crate::convert;

/// Reads and parses a TOML run description.
pub fn load_config(path: &std::path::Path) -> Result<RunConfig> {
    let toml_str = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&toml_str).context("failed to parse TOML config")
}

/// Run the filter and smoother and print the per-step table.
pub fn run(args: SmoothArgs) -> Result<()> {
    let _cmd = info_span!("smooth").entered();
    // 1. Load run description
    let config = load_config(&args.config)?;

    // 2. Build library types, CLI flags override the config file
    let model = convert::build_model(&config.model)?;
    let data = convert::build_data(&config)?;
    let mut filter_cfg = convert::build_filter_config(&config.filter)?;
    if let Some(ref name) = args.transformation {
        filter_cfg = filter_cfg.with_transformation(convert::parse_transformation(name)?);
    }
    info!(
        n = data.len(),
        missing = data.count_missing(),
        "observations loaded"
    );

    // 3. Filter, smooth and evaluate the likelihood on one pass
    let output = toolkit::filter(&model, &data, &filter_cfg).context("filtering failed")?;
    info!(t_star = output.transition_index(), "diffuse initialization complete");
    let smoothed = DiffuseSquareRootSmoother::new(&filter_cfg)
        .with_covariance(config.covariance)
        .smooth(&model, &output)
        .context("smoothing failed")?;
    let ll = DiffuseLikelihood::from_output(&output);

    // 4. Report
    print!("{}", render_table(&data, &output, &smoothed, '\t'));
    println!("log-likelihood\t{:.6}", ll.log_likelihood());

    if let Some(path) = args.output {
        std::fs::write(&path, render_table(&data, &output, &smoothed, ','))
            .with_context(|| format!("failed to write table: {}", path.display()))?;
        info!(path = %path.display(), "table written");
    }
    Ok(())
}

/// Formats one row per observation: `t, y, e, f, fi, mean[0], var[0]`.
///
/// Missing entries (unobserved `y`, skipped updates, absent covariances)
/// are written as `NaN`.
pub fn render_table(data: &SsfData, output: &FilterOutput, smoothed: &SmoothedStates, sep: char) -> String {
    let mut out = String::new();
    let header = ["t", "y", "e", "f", "fi", "mean", "var"];
    let _ = writeln!(out, "{}", header.join(&sep.to_string()));
    let variances = smoothed.component_variance(0);
    for t in 0..data.len() {
        let (e, f, fi) = output.prediction_error(t).unwrap_or((f64::NAN, f64::NAN, f64::NAN));
        let var = variances.as_ref().map_or(f64::NAN, |v| v[t]);
        let _ = writeln!(
            out,
            "{t}{sep}{:.6}{sep}{e:.6}{sep}{f:.6}{sep}{fi:.6}{sep}{:.6}{sep}{var:.6}",
            data.get(t),
            smoothed.mean(t)[0],
        );
    }
    out
}
