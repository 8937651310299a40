//! Likelihood command: report the diffuse log-likelihood of a series.

use anyhow::{Context, Result};
use tracing::{info, info_span};

use kalmar_ssf::toolkit;

use crate::cli::LikelihoodArgs;
use crate::convert;
use crate::smooth_cmd::load_config;

/// Run the filter in light mode and print the likelihood summary.
pub fn run(args: LikelihoodArgs) -> Result<()> {
    let _cmd = info_span!("likelihood").entered();
    let config = load_config(&args.config)?;
    let model = convert::build_model(&config.model)?;
    let data = convert::build_data(&config)?;
    let filter_cfg = convert::build_filter_config(&config.filter)?;

    let ll = toolkit::likelihood(&model, &data, &filter_cfg).context("filtering failed")?;
    info!(n_obs = ll.n_obs(), n_diffuse = ll.n_diffuse(), "likelihood evaluated");

    println!("observations\t{}", ll.n_obs());
    println!("diffuse\t{}", ll.n_diffuse());
    println!("log-likelihood\t{:.6}", ll.log_likelihood());
    println!("sigma2\t{:.6}", ll.sigma2());
    println!("concentrated\t{:.6}", ll.concentrated_log_likelihood());
    Ok(())
}
