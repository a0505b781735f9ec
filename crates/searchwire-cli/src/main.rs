//! # Searchwire CLI
//!
//! Issues requests against a search engine cluster through the failover
//! transport.
//!
//! ## Usage
//!
//! ```bash
//! # Raw request; prints the status line, then the body
//! searchwire -s 10.0.0.1:9200 -s 10.0.0.2:9200 request GET /_status
//!
//! # Index a document
//! searchwire -s 127.0.0.1:9200 request POST /twitter/tweet/1 -b '{"user":"kimchy"}'
//!
//! # Count and search with a query string
//! searchwire count 'user:kimchy' -i twitter
//! searchwire search twitter 'user:kimchy' --size 5 --ids
//!
//! # Fetch a document's source
//! searchwire get twitter tweet 1
//! ```
//!
//! Servers default to `SEARCHWIRE_SERVERS` (comma-separated); the other
//! `SEARCHWIRE_*` variables are read as well and flags take precedence.
//! Logs go to stderr, controlled by `RUST_LOG`.

use anyhow::{Context, Result};
use argh::FromArgs;
use searchwire_client::{ConnectionBuilder, SearchClient, SearchRequest};
use searchwire_common::transport::WireProtocol;
use searchwire_common::{Method, Server};

/// Timeout applied when neither `--timeout-ms` nor the environment set one
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(FromArgs, Debug)]
/// searchwire - command-line client for search engine clusters
struct Cli {
    /// server address as host:port; repeat for failover
    #[argh(option, short = 's', long = "server")]
    servers: Vec<String>,

    /// connect and I/O timeout in milliseconds (default 5000)
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// wire protocol: http (default) or framed
    #[argh(option, long = "protocol")]
    protocol: Option<String>,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Commands {
    Request(RequestArgs),
    Count(CountArgs),
    Search(SearchArgs),
    Get(GetArgs),
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "request")]
/// send a raw request and print the status and body
struct RequestArgs {
    /// request method: GET, POST, PUT, DELETE or HEAD
    #[argh(positional)]
    method: String,

    /// request path including any query string
    #[argh(positional)]
    path: String,

    /// request body, usually JSON
    #[argh(option, short = 'b')]
    body: Option<String>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "count")]
/// count documents matching a query string
struct CountArgs {
    /// query string, e.g. user:kimchy
    #[argh(positional)]
    query: String,

    /// index to count in; repeatable, all indices when omitted
    #[argh(option, short = 'i', long = "index")]
    indices: Vec<String>,

    /// document type; repeatable
    #[argh(option, short = 't', long = "type")]
    types: Vec<String>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "search")]
/// search an index with a query string
struct SearchArgs {
    /// index to search
    #[argh(positional)]
    index: String,

    /// query string
    #[argh(positional)]
    query: String,

    /// document type; repeatable
    #[argh(option, short = 't', long = "type")]
    types: Vec<String>,

    /// offset of the first hit
    #[argh(option, default = "0")]
    from: u32,

    /// number of hits to return
    #[argh(option, default = "10")]
    size: u32,

    /// sort expression, e.g. date:desc
    #[argh(option)]
    sort: Option<String>,

    /// print only the ids of the hits, one per line
    #[argh(switch)]
    ids: bool,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "get")]
/// fetch a document and print its source
struct GetArgs {
    /// index name
    #[argh(positional)]
    index: String,

    /// document type
    #[argh(positional)]
    doc_type: String,

    /// document id
    #[argh(positional)]
    id: String,
}

fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // stdout carries results only
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let client = SearchClient::from_builder(builder(&cli)?)?;

    match cli.command {
        Commands::Request(args) => run_request(&client, args),
        Commands::Count(args) => run_count(&client, args),
        Commands::Search(args) => run_search(&client, args),
        Commands::Get(args) => run_get(&client, args),
    }
}

/// Environment first, flags on top.
fn builder(cli: &Cli) -> Result<ConnectionBuilder> {
    let mut builder = ConnectionBuilder::from_env().context("Invalid SEARCHWIRE_* environment")?;

    if !cli.servers.is_empty() {
        let servers = cli
            .servers
            .iter()
            .map(|s| s.parse::<Server>())
            .collect::<Result<Vec<_>, _>>()?;
        builder = builder.replace_servers(servers);
    }
    if let Some(protocol) = &cli.protocol {
        builder = builder.protocol(protocol.parse::<WireProtocol>()?);
    }
    match cli.timeout_ms {
        Some(ms) => builder = builder.timeout_ms(ms),
        None if builder.configured_timeout_ms() == 0 => {
            builder = builder.timeout_ms(DEFAULT_TIMEOUT_MS);
        }
        None => {}
    }

    if builder.configured_servers().is_empty() {
        anyhow::bail!("No servers given; pass --server or set SEARCHWIRE_SERVERS");
    }
    Ok(builder)
}

fn run_request(client: &SearchClient, args: RequestArgs) -> Result<()> {
    let method: Method = args.method.parse()?;
    let response = client
        .executor()
        .execute(method, &args.path, args.body.as_deref())?;

    println!("{}", response.status);
    if let Some(body) = response.body_str() {
        println!("{}", pretty(body));
    }
    Ok(())
}

fn run_count(client: &SearchClient, args: CountArgs) -> Result<()> {
    let indices: Vec<&str> = args.indices.iter().map(String::as_str).collect();
    let types: Vec<&str> = args.types.iter().map(String::as_str).collect();

    let count = client
        .count(&indices, &types, &args.query)?
        .context("Response did not contain a count")?;
    println!("{}", count);
    Ok(())
}

fn run_search(client: &SearchClient, args: SearchArgs) -> Result<()> {
    let mut request = SearchRequest::new(args.index, args.query)
        .types(args.types)
        .from(args.from)
        .size(args.size);
    if let Some(sort) = args.sort {
        request = request.sort(sort);
    }

    let result = client.search(&request)?;
    if !result.status.is_success() {
        anyhow::bail!(
            "Search failed with {}: {}",
            result.status,
            result.body.unwrap_or_default()
        );
    }

    if args.ids {
        for id in result.ids() {
            println!("{}", id);
        }
    } else if let Some(body) = &result.body {
        println!("{}", pretty(body));
    }
    Ok(())
}

fn run_get(client: &SearchClient, args: GetArgs) -> Result<()> {
    let document = client.get(&args.index, &args.doc_type, &args.id)?;
    if !document.exists() {
        anyhow::bail!("Document {}/{}/{} not found", args.index, args.doc_type, args.id);
    }

    match document.source() {
        Some(source) => println!("{}", serde_json::to_string_pretty(source)?),
        None => println!("{}", document.body.as_deref().map(pretty).unwrap_or_default()),
    }
    Ok(())
}

/// Pretty-prints JSON bodies, passes anything else through.
fn pretty(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| body.to_string())
}
