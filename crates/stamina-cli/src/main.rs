//! Command-line interface for the stamina truncated CTMC model checker.

use clap::Parser;
use miette::{Diagnostic, NamedSource, SourceSpan};
use stamina_lang::ast::Expr;
use stamina_lang::modify::{augment_model_source, augment_properties, render_augmented};
use stamina_lang::properties::parse_properties;
use stamina_lang::{analyze, parse_program, ProgramGenerator};
use stamina_mc::{
    write_results, BuildConfig, BuildError, Discipline, Explorer, PropertyPair, Refiner,
    ERR_GENERAL,
};
use stamina_model::BoundedUntil;
use stamina_solver::TransientSolver;
use std::fs;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI error with source context for pretty printing.
#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("parse error in {path}: {message}")]
    #[diagnostic(code(stamina::parse_error))]
    Parse {
        path: String,
        message: String,
        #[source_code]
        src: NamedSource<Arc<String>>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("analysis error: {0}")]
    Analysis(#[from] stamina_lang::AnalysisError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl CliError {
    fn from_parse_error(
        error: stamina_lang::ParseError,
        source: Arc<String>,
        path: &str,
    ) -> Self {
        let span = error.span();
        CliError::Parse {
            path: path.to_string(),
            message: error.to_string(),
            src: NamedSource::new(path, source),
            span: (span.start, span.len()).into(),
        }
    }

    fn exit_code(&self) -> i32 {
        match self {
            CliError::Build(error) => error.exit_code(),
            _ => ERR_GENERAL,
        }
    }
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "stamina", version)]
#[command(about = "Infinite-state CTMC model checking by state-space truncation", long_about = None)]
struct Cli {
    /// Model file
    #[arg(value_name = "MODEL")]
    model: PathBuf,

    /// Properties file
    #[arg(value_name = "PROPERTIES")]
    properties: PathBuf,

    /// Initial reachability threshold kappa
    #[arg(short, long, default_value = "1.0", help_heading = "Truncation")]
    kappa: f64,

    /// Factor by which kappa shrinks each refinement iteration (> 1)
    #[arg(short, long, default_value = "1.25", help_heading = "Truncation")]
    reduce_kappa: f64,

    /// Maximum allowed Pmax - Pmin window
    #[arg(short = 'w', long, default_value = "1e-3", help_heading = "Truncation")]
    prob_win: f64,

    /// Maximum number of refinement iterations
    #[arg(short = 'n', long, default_value = "10", help_heading = "Truncation")]
    max_approx_count: u32,

    /// Disable property-guided state reclassification
    #[arg(long, help_heading = "Truncation")]
    no_prop_refine: bool,

    /// Exploration discipline: iterative, priority, or re-exploring
    #[arg(long, default_value = "iterative", help_heading = "Truncation")]
    discipline: Discipline,

    /// Fail on states with no enabled choices instead of stubbing self-loops
    #[arg(long, help_heading = "Truncation")]
    no_fix_deadlocks: bool,

    /// Write the augmented model to this file
    #[arg(long, value_name = "FILE")]
    save_modified_model: Option<PathBuf>,

    /// Write the augmented properties to this file
    #[arg(long, value_name = "FILE")]
    save_modified_properties: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Only show errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(&cli) {
        let code = error.exit_code();
        eprintln!("{:?}", miette::Report::new(error));
        exit(code);
    }
}

fn read_file(path: &PathBuf) -> CliResult<String> {
    fs::read_to_string(path).map_err(|e| CliError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn run(cli: &Cli) -> CliResult<()> {
    let model_source = read_file(&cli.model)?;
    let properties_source = read_file(&cli.properties)?;
    let model_path = cli.model.display().to_string();
    let properties_path = cli.properties.display().to_string();

    // Augment the model with the absorbing flag, then parse like any model.
    let augmented_source = augment_model_source(&model_source);
    let program = parse_program(&augmented_source)
        .map_err(|e| CliError::from_parse_error(e, Arc::new(augmented_source.clone()), &model_path))?;
    let info = analyze(&program)?;

    let properties = parse_properties(&properties_source).map_err(|e| {
        CliError::from_parse_error(e, Arc::new(properties_source.clone()), &properties_path)
    })?;
    let augmented = augment_properties(&properties);
    info!(
        properties = augmented.len(),
        model = %model_path,
        "augmented model and properties"
    );

    if let Some(path) = &cli.save_modified_model {
        fs::write(path, &augmented_source).map_err(|e| CliError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    }
    if let Some(path) = &cli.save_modified_properties {
        fs::write(path, render_augmented(&augmented)).map_err(|e| CliError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    }

    // Register the augmented predicates as label expressions so the solver
    // can reference them by name on the finished model.
    let mut generator = ProgramGenerator::new(info);
    let mut pairs = Vec::new();
    for (index, prop) in augmented.iter().enumerate() {
        let min_label = format!("stamina_prop{index}_min");
        let max_label = format!("stamina_prop{index}_max");
        generator.register_label_expression(&min_label, prop.pmin.path.target().clone());
        generator.register_label_expression(&max_label, prop.pmax.path.target().clone());

        let left_label = prop.original.path.left().map(|left: &Expr| {
            let name = format!("stamina_prop{index}_left");
            generator.register_label_expression(&name, left.clone());
            name
        });
        let refine_label = prop.original.path.left().map(|left: &Expr| {
            let name = format!("stamina_prop{index}_phi");
            let phi = Expr::binary(
                stamina_lang::ast::BinOp::Or,
                left.clone(),
                prop.original.path.target().clone(),
            );
            generator.register_label_expression(&name, phi);
            name
        });

        let bound = prop.original.path.time_bound();
        pairs.push(PropertyPair {
            name: prop.name.clone(),
            pmin: BoundedUntil {
                left_label: left_label.clone(),
                right_label: min_label,
                time_bound: bound,
            },
            pmax: BoundedUntil {
                left_label,
                right_label: max_label,
                time_bound: bound,
            },
            refine_label,
        });
    }

    let config = BuildConfig {
        kappa: cli.kappa,
        reduce_kappa: cli.reduce_kappa,
        prob_win: cli.prob_win,
        max_approx_count: cli.max_approx_count,
        no_prop_refine: cli.no_prop_refine,
        discipline: cli.discipline,
        fix_deadlocks: !cli.no_fix_deadlocks,
    };

    let explorer = Explorer::new(generator, &config)?;
    let mut refiner = Refiner::new(explorer, TransientSolver::new(), config);

    let stdout = std::io::stdout();
    for pair in &pairs {
        let result = refiner.check_property(pair)?;
        write_results(&result, &mut stdout.lock()).map_err(|e| CliError::Io {
            path: "<stdout>".to_string(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}
