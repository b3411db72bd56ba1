use clap::Parser;
use tokio::io::BufReader;
use tracing::error;
use writer_vss::cli::ask::ask_loop;
use writer_vss::cli::commands::{Cli, Commands};
use writer_vss::config::Settings;
use writer_vss::domain::entities::writer::NewWriter;
use writer_vss::domain::ports::vector_store::WriterFilter;
use writer_vss::domain::values::metric::DistanceMetric;
use writer_vss::infrastructure::dataset::load_dataset;
use writer_vss::{telemetry, WriterSearch};

#[tokio::main]
async fn main() {
    telemetry::init_tracing();
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Duplicate checking only reads the dataset.
    if let Commands::Duplicates { file } = &cli.command {
        if let Err(e) = report_duplicates(file) {
            error!("{e}");
            std::process::exit(1);
        }
        return;
    }

    let engine = match WriterSearch::connect(&settings).await {
        Ok(engine) => engine,
        Err(e) => {
            error!("Error initializing writer search: {e}");
            std::process::exit(1);
        }
    };

    let result = run_command(&engine, cli.command).await;
    let closed = engine.disconnect().await;
    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
    if let Err(e) = closed {
        error!("Disconnect failed: {e}");
        std::process::exit(1);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_duplicates(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let records = load_dataset(file)?;
    let duplicates = writer_vss::application::duplicates::find_duplicate_names(&records);
    print_json(&serde_json::json!({
        "total": records.len(),
        "duplicate_count": duplicates.len(),
        "duplicates": duplicates,
    }))
}

async fn run_command(engine: &WriterSearch, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Seed { file } => {
            let records = load_dataset(&file)?;
            let report = engine.seed(records).await?;
            print_json(&report)?;
        }
        Commands::Reembed { batch_size } => {
            let report = match batch_size {
                Some(size) => engine.reembed_batch(size).await?,
                None => engine.reembed().await?,
            };
            print_json(&report)?;
        }
        Commands::Search { query, k, metric, work } => {
            let metric: DistanceMetric = metric.parse()?;
            let filter = WriterFilter {
                work,
                ..Default::default()
            };
            let hits = engine.search_text(&query, k, metric, filter).await?;
            print_json(&hits)?;
        }
        Commands::Ask { k, metric } => {
            let metric: DistanceMetric = metric.parse()?;
            let exit = ask_loop(
                engine,
                BufReader::new(tokio::io::stdin()),
                k,
                metric,
                tokio::signal::ctrl_c(),
                &mut std::io::stdout(),
            )
            .await?;
            tracing::debug!(?exit, "Question loop finished");
        }
        Commands::Get { id } => match engine.get(id).await? {
            Some(writer) => print_json(&writer)?,
            None => println!("Writer not found: {id}"),
        },
        Commands::Scan { offset, limit } => {
            let writers = engine.scan(offset, limit).await?;
            print_json(&writers)?;
        }
        Commands::Find { work, text, limit } => {
            let writers = engine.filter(WriterFilter { work, text, limit }).await?;
            print_json(&writers)?;
        }
        Commands::Update { id, json } => {
            let record: NewWriter = serde_json::from_str(&json)?;
            let writer = engine.upsert(id, record).await?;
            print_json(&writer)?;
        }
        Commands::Duplicates { file } => report_duplicates(&file)?,
        Commands::Stats => {
            let stats = engine.stats().await?;
            print_json(&stats)?;
        }
        Commands::CreateIndex => {
            engine.create_index().await?;
            println!("Index ready");
        }
    }
    Ok(())
}
