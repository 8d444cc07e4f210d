use clap::Parser;
use fvcore::solver::case::Case;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs a finite-volume case described by a JSON file")]
struct Args {
    /// Case file
    case: PathBuf,

    /// Overrides the case's nProcs
    #[arg(long)]
    n_procs: Option<usize>,

    /// Directory the final fields are written to, one subdirectory per rank
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            log::warn!("run finished without converging");
            ExitCode::from(2)
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    let mut case = Case::read(&args.case)?;
    if let Some(n) = args.n_procs {
        case.n_procs = n.max(1);
    }

    let reports = case.run_all()?;
    for report in &reports {
        log::info!(
            "rank {}: {} steps, converged = {}, residuals {:?}",
            report.rank,
            report.steps,
            report.converged,
            report.residuals
        );
    }

    if let Some(out) = &args.out {
        for report in &reports {
            let dir = if reports.len() == 1 {
                out.clone()
            } else {
                out.join(format!("processor{}", report.rank))
            };
            fs::create_dir_all(&dir)?;
            for (name, value) in &report.fields {
                let path = dir.join(format!("{}.json", name));
                fs::write(&path, serde_json::to_string_pretty(value)?)?;
                log::info!("wrote {}", path.display());
            }
        }
    }

    Ok(reports.iter().all(|r| r.converged))
}
