mod analysis;
mod api;
mod database;
mod error;
mod filter;
mod query;
mod settings;
mod web;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::{
    database::Database,
    settings::{Args, Settings},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let settings =
        Settings::load(args.config.as_deref()).context("Problem while loading settings")?;
    let database = Database::connect(&settings.database.path).with_context(|| {
        format!(
            "Problem while opening the database at {}",
            settings.database.path.display()
        )
    })?;
    info!("{} string analyses stored", database.count());

    let schema = api::schema(database.clone());
    web::serve(schema, database, settings.web.address, args.tls()).await;
    Ok(())
}
