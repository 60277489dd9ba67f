//! # Search Round-Trip Smoke Test
//!
//! Boots the registry through autoconfiguration, indexes a document into a
//! live search node and searches it back, expecting a 200 for the search.
//!
//! ## Usage:
//! Start a node (e.g. `docker run -p 9200:9200 -e discovery.type=single-node elasticsearch:7.17.0`)
//! and run `cargo run -p project_tests --bin test_search_roundtrip`.
//!
//! The endpoint comes from `SEARCH__CLIENT__URIS`, an optional
//! `search_roundtrip.json` next to the working directory, or the default
//! `http://localhost:9200`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use clap::Parser;
use std::collections::HashMap;
use tracing::info;

use lib_search::autoconfig::{self, SharedClient};
use lib_search::loggers::init_logging;
use lib_search::{Index, PropertySources, Search};

#[derive(Parser, Debug)]
#[command(author, version, about = "Index-then-search smoke test against a live search node")]
struct Args {
    #[arg(long, default_value = "search_roundtrip.json", help = "Optional JSON configuration file.")]
    config: String,

    #[arg(long, default_value = "foo", help = "Index to write the test document to.")]
    index: String,

    #[arg(long, env = "SEARCH_ROUNDTRIP_LOG_LEVEL", default_value = "info", help = "Logging level.")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_logging("test_search_roundtrip", &args.log_level, None)?;

    println!("--- Starting Search Round-Trip Test ---");

    // 1. Bootstrap the registry from file, environment and defaults
    let sources = PropertySources::new().json_file(&args.config).env_vars(true);
    let registry = autoconfig::bootstrap(&sources, |_| {})?;
    let client: SharedClient = registry.get()?;
    println!("✅ Registry contains {} search client(s)", registry.count::<SharedClient>());

    // 2. Index a document and make it searchable right away
    let mut source = HashMap::new();
    source.insert("a", "alpha");
    source.insert("b", "bravo");
    let index = Index::builder(&source)?
        .index(args.index.as_str())
        .refresh(true)
        .build();
    let indexed = client.execute(&index).await?;
    info!(status = indexed.status, "document indexed");
    assert!(indexed.succeeded, "index failed: {:?}", indexed.error_message);
    println!("✅ Indexed document, status {}", indexed.status);

    // 3. Search it back
    let query = serde_json::json!({ "query": { "match": { "a": "alpha" } } }).to_string();
    let search = Search::builder(query).add_index(args.index.as_str()).build();
    let found = client.execute(&search).await?;
    assert_eq!(found.status, 200, "search failed: {:?}", found.error_message);
    println!("✅ Search status {}, hits: {:?}", found.status, found.total_hits());

    registry.close();
    println!("\n--- All Tests Passed Successfully ---");
    Ok(())
}
