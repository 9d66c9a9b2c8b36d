//! layout-probe: solve a column split from the command line.
//!
//! ## Usage
//!
//! ```bash
//! layout-probe --width 120 --columns 3           # equal columns
//! layout-probe --width 120 --drag 70 --dump      # drag the first divider
//! RUST_LOG=nexus_layout=debug layout-probe       # trace insertions
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nexus_layout::{Relational, Solver, SolverConfig, Strength, Variable};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "layout-probe", about = "Solve a column split with the layout solver")]
struct Args {
    /// Total width to split.
    #[arg(long, default_value_t = 80.0)]
    width: f64,

    /// Number of columns.
    #[arg(long, default_value_t = 3)]
    columns: u32,

    /// Gap between adjacent columns.
    #[arg(long, default_value_t = 1.0)]
    gap: f64,

    /// Minimum column width.
    #[arg(long, default_value_t = 10.0)]
    min_width: f64,

    /// Drag the first column to this width through an edit variable.
    #[arg(long)]
    drag: Option<f64>,

    /// Solver config as JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the tableau after solving.
    #[arg(long)]
    dump: bool,

    /// Print solver counters as JSON.
    #[arg(long)]
    stats: bool,
}

struct Column {
    left: Variable,
    width: Variable,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.columns == 0 {
        anyhow::bail!("--columns must be at least 1");
    }

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => SolverConfig::default(),
    };

    let mut solver = Solver::with_config(config);
    let columns: Vec<Column> = (0..args.columns)
        .map(|i| Column {
            left: Variable::new(2 * i),
            width: Variable::new(2 * i + 1),
        })
        .collect();

    solver.batch(|solver| build(solver, &columns, &args))??;

    if let Some(target) = args.drag {
        let first = columns[0].width;
        solver.add_edit_variable(first, Strength::STRONG)?;
        solver.suggest_value(first, target)?;
    }

    for (i, column) in columns.iter().enumerate() {
        println!(
            "column {}: left = {:.2}, width = {:.2}",
            i,
            solver.get(column.left),
            solver.get(column.width)
        );
    }
    if args.dump {
        print!("{}", solver.dump());
    }
    if args.stats {
        println!("{}", serde_json::to_string_pretty(&solver.stats())?);
    }
    Ok(())
}

fn build(solver: &mut Solver, columns: &[Column], args: &Args) -> Result<()> {
    let (Some(first), Some(last)) = (columns.first(), columns.last()) else {
        return Ok(());
    };

    solver.add_constraint(first.left.equal_to(0.0))?;
    solver.add_constraint((last.left + last.width).equal_to(args.width))?;

    for pair in columns.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        solver.add_constraint(b.left.equal_to(a.left + a.width + args.gap))?;
    }

    for column in columns {
        solver.add_constraint(column.width.greater_or_equal(args.min_width))?;
        if column.width != first.width {
            solver.set_constraint(column.width.equal_to(first.width), Strength::MEDIUM)?;
        }
    }
    Ok(())
}
