use anyhow::Context;
use clap::Parser;

use labjudge::catalog::Catalog;
use labjudge::config::CliArgs;
use labjudge::sandbox::create_runner;
use labjudge::session::GradingSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config().context("failed to load configuration")?;

    let catalog = match &cli.catalog_path {
        Some(path) => Catalog::from_json_file(path)?,
        None => Catalog::builtin()?,
    };

    if cli.list {
        for exercise in catalog.exercises() {
            println!(
                "{:<24} {:<8} {}",
                exercise.id,
                format!("{:?}", exercise.difficulty).to_lowercase(),
                exercise.title
            );
        }
        return Ok(());
    }

    let exercise_id = cli
        .exercise_id
        .context("--exercise is required unless --list is given")?;
    let source_path = cli
        .source_path
        .context("--source is required unless --list is given")?;

    let exercise = catalog
        .get(&exercise_id)
        .with_context(|| format!("unknown exercise `{exercise_id}`"))?;
    let source = std::fs::read_to_string(&source_path)
        .with_context(|| format!("failed to read candidate source {source_path}"))?;

    let runner = create_runner(config.limits);
    let session = GradingSession::new(exercise, runner);
    let report = session.submit_run(source).await?;

    println!("{report}");

    if !report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}
