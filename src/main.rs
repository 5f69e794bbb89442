use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;

use clubdex::{AppConfig, ClubApi, ClubIndex, FacilityImporter, PgClubStore, Pipeline};

extern crate env_logger;
extern crate log;

use log::LevelFilter;

use log::info;

#[derive(Debug, Parser)]
#[command(name = "clubdex")]
#[command(about = "UK golf club directory scraper and loader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch the regional listings and write the club index artifacts.
    Fetch {
        /// Also fetch the per-club detail record for every club (slower).
        #[arg(long, short)]
        detailed: bool,
    },
    /// Load the whole index file into the database (insert-if-absent).
    Import {
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Load only the clubs missing from the database, enriching each one on
    /// the way in.
    ImportMissing {
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Populate the facility taxonomy and per-club facility rows.
    Facilities,
    /// Rewrite the no-images companion for an existing index file.
    StripImages,
}

async fn connect(config: &AppConfig) -> Result<PgClubStore> {
    let store = PgClubStore::connect(config.database_url()?).await?;
    store.ensure_schema().await?;
    Ok(store)
}

fn pipeline(config: &AppConfig, batch_size: Option<usize>) -> Result<Pipeline> {
    let api = ClubApi::new(config.request_delay())?;
    Ok(Pipeline::new(
        api,
        batch_size.unwrap_or(config.batch_size()),
        config.data_dir(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::new()?;

    match cli.command {
        Commands::Fetch { detailed } => {
            let (index, summary) = pipeline(&config, None)?.fetch(detailed).await?;
            index.save(&config.index_path())?;
            index.strip_images().save(&config.no_images_path())?;
            info!(
                "saved {} clubs to {}",
                index.total,
                config.index_path().display()
            );
            println!("{summary}");
        }
        Commands::Import { batch_size } => {
            let index = ClubIndex::load(&config.index_path())?;
            let store = connect(&config).await?;
            let summary = pipeline(&config, batch_size)?
                .load(index.clubs, &store, false)
                .await;
            println!("{summary}");
        }
        Commands::ImportMissing { batch_size } => {
            let index = ClubIndex::load(&config.index_path())?;
            let store = connect(&config).await?;
            let summary = pipeline(&config, batch_size)?
                .load(index.clubs, &store, true)
                .await;
            println!("{summary}");
        }
        Commands::Facilities => {
            let store = connect(&config).await?;
            let api = ClubApi::new(config.request_delay())?;
            let importer = FacilityImporter::new(&api, config.batch_size());
            let summary = importer.import(&store).await?;
            println!("{summary}");
        }
        Commands::StripImages => {
            let index = ClubIndex::load(&config.index_path())?;
            index.strip_images().save(&config.no_images_path())?;
            info!("wrote {}", config.no_images_path().display());
        }
    }

    Ok(())
}
