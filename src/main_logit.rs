use clap::Parser;
use ordered_float::NotNan;
use qre_behav::game_arena::ArenaGame;
use qre_behav::game_poker::myerson_poker;
use qre_behav::qre::{LogitSolution, LogitSolver, SolverConfig};
use qre_behav::{BehaviorProfile, BehaviorSupport, Result};
use std::collections::BTreeSet;
use std::time::Instant;

/// Solves the logit equations of Myerson poker at each requested lambda.
#[derive(Parser, Debug)]
#[command(name = "logit", version)]
struct Args {
    /// Lambda to solve at; may be repeated
    #[arg(
        short,
        long = "lambda",
        value_parser = parse_lambda,
        default_values = ["0.5", "1", "2", "4"]
    )]
    lambda: Vec<NotNan<f64>>,

    /// Decimal places in the output
    #[arg(short, long, default_value_t = 6)]
    decimals: usize,

    /// Initial step size of the line search
    #[arg(short, long, default_value_t = 0.03)]
    step: f64,

    /// Report whether each solution's max regret is below this threshold
    #[arg(short, long)]
    max_regret: Option<f64>,

    /// Suppress the banner
    #[arg(short, long)]
    quiet: bool,

    /// Gradient norm at which a solve stops
    #[arg(long, default_value_t = 1e-10)]
    tol: f64,

    /// Iteration cap per lambda
    #[arg(long, default_value_t = 1000)]
    max_iter: usize,
}

/// Accepts finite, non-negative lambdas only.
fn parse_lambda(arg: &str) -> std::result::Result<NotNan<f64>, String> {
    let lambda = arg
        .parse::<f64>()
        .map_err(|e| format!("invalid lambda '{}': {}", arg, e))?;
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(format!("lambda must be finite and non-negative, got {}", arg));
    }
    NotNan::new(lambda).map_err(|_| format!("lambda must not be NaN, got {}", arg))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let lambdas = args.lambda.iter().copied().collect::<BTreeSet<_>>();

    if !args.quiet {
        eprintln!("Compute logit quantal response equilibria in behavior strategies");
        eprintln!("[Myerson poker]");
        eprintln!();
    }

    let game = myerson_poker()?;
    let support = BehaviorSupport::new(&game);
    let mut previous: Option<LogitSolution> = None;

    for lambda in lambdas {
        let solver = LogitSolver::new(SolverConfig {
            lambda: lambda.into_inner(),
            step_size: args.step,
            tolerance: args.tol,
            max_iterations: args.max_iter,
            ..SolverConfig::default()
        });

        let start = Instant::now();
        let solution = solver.solve(&support, previous.as_ref().map(|s| &s.log_probs[..]))?;
        let elapsed = start.elapsed();
        log::info!(
            "lambda = {}: {} iterations in {:.3?}",
            solution.lambda,
            solution.iterations,
            elapsed
        );

        print_row(&support, &solution, &args)?;
        previous = Some(solution);
    }

    Ok(())
}

fn print_row(
    support: &BehaviorSupport<ArenaGame>,
    solution: &LogitSolution,
    args: &Args,
) -> Result<()> {
    let mut profile = BehaviorProfile::new(support);
    profile.set_log_probs(&solution.log_probs)?;
    let regret = profile.max_regret();

    let decimals = args.decimals;
    let mut row = format!("{:.*}", decimals, solution.lambda);
    for p in &solution.probs {
        row += &format!(",{:.*}", decimals, p);
    }
    row += &format!(",{:.3e}", regret);
    if let Some(threshold) = args.max_regret {
        row += if regret <= threshold { ",ok" } else { ",over" };
    }
    if !solution.converged {
        row += ",unconverged";
    }
    println!("{}", row);
    Ok(())
}
