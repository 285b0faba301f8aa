//! datagate entry point.
//!
//! Opens the configured SQLite database, makes sure the `user_data` table
//! exists, then runs a concurrent fetch and a streamed aggregate over it.

use anyhow::Context;
use futures_util::{StreamExt, pin_mut};
use tracing_subscriber::EnvFilter;

use datagate::config::DataGateConfig;
use datagate::domain::Query;
use datagate::service::DataGate;

const CREATE_USER_DATA: &str = "CREATE TABLE IF NOT EXISTS user_data (\
    user_id INTEGER PRIMARY KEY, \
    name TEXT NOT NULL, \
    email TEXT NOT NULL, \
    age INTEGER NOT NULL)";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = DataGateConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(database = %config.database_url, "starting datagate");

    let gate = DataGate::from_config(&config).context("building data gate")?;
    gate.execute(&Query::new(CREATE_USER_DATA))
        .await
        .context("creating user_data table")?;

    // Independent reads, run together
    let queries = [
        Query::new("SELECT * FROM user_data"),
        Query::new("SELECT * FROM user_data WHERE age > ?").bind(40),
    ];
    let results = gate
        .gather_queries(&queries)
        .await
        .context("concurrent fetch")?;
    for (query, rows) in queries.iter().zip(&results) {
        tracing::info!(query = query.text(), rows = rows.len(), "fetched");
    }
    if let Some(sample) = results.first().and_then(|rows| rows.first()) {
        let json = serde_json::to_string(sample).context("serializing sample row")?;
        tracing::info!(row = %json, "sample user");
    }

    // Streamed aggregate, one row in memory at a time
    let ages = gate.stream_rows(Query::new("SELECT age FROM user_data"));
    pin_mut!(ages);
    let (mut total, mut count) = (0i64, 0i64);
    while let Some(row) = ages.next().await {
        let age: i64 = row.context("streaming ages")?.get("age")?;
        total += age;
        count += 1;
    }
    if count == 0 {
        tracing::info!("no users; average age undefined");
    } else {
        #[allow(clippy::cast_precision_loss)]
        let average = total as f64 / count as f64;
        tracing::info!(users = count, average_age = average, "average age");
    }

    Ok(())
}
