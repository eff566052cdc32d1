use anyhow::Context;
use clap::{value_parser, Arg, Command};
use planner_sim::{run_simulator, SimulatorConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("planner_sync=info")),
        )
        .init();

    let cli = Command::new("planner-sim")
        .version(planner_sync::VERSION)
        .about("Planner sync engine simulator")
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Run seeded edit bursts against a flaky store")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_name("TOML")
                        .help("Load settings from a TOML file; flags override it"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("entities")
                        .long("entities")
                        .value_parser(value_parser!(usize))
                        .help("Number of courses edited concurrently"),
                )
                .arg(
                    Arg::new("edits")
                        .long("edits")
                        .value_parser(value_parser!(usize))
                        .help("Edits issued per course"),
                )
                .arg(
                    Arg::new("failure-rate")
                        .long("failure-rate")
                        .value_parser(value_parser!(f64))
                        .help("Share of update calls that fail, in [0, 1)"),
                ),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let mut config = match args.get_one::<String>("config") {
                Some(path) => {
                    let source = std::fs::read_to_string(path)
                        .with_context(|| format!("reading {path}"))?;
                    SimulatorConfig::from_toml_str(&source)?
                }
                None => SimulatorConfig::default(),
            };
            if let Some(seed) = args.get_one::<u64>("seed") {
                config.seed = *seed;
            }
            if let Some(entities) = args.get_one::<usize>("entities") {
                config.entities = *entities;
            }
            if let Some(edits) = args.get_one::<usize>("edits") {
                config.edits_per_entity = *edits;
            }
            if let Some(rate) = args.get_one::<f64>("failure-rate") {
                config.failure_rate = *rate;
            }

            println!("Running planner sync simulator...");
            println!("Seed: {}", config.seed);
            println!("Entities: {}", config.entities);
            println!("Edits per entity: {}", config.edits_per_entity);
            println!("Failure rate: {}", config.failure_rate);
            println!();

            let report = run_simulator(config).await?;
            println!("{}", report.generate_text());

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        _ => Ok(()),
    }
}
