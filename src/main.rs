//! CLI interface for direct-flights

use anyhow::Result;
use clap::{Parser, Subcommand};
use direct_flights::agent::FlightAgent;
use direct_flights::gemini::GeminiClient;
use direct_flights::recommend::{recommend, DEFAULT_TOLERANCE_PCT, DEFAULT_TOP_N};
use direct_flights::search::DirectFlightSearch;
use direct_flights::web::{router, AppState};
use direct_flights::{parse_date, resolve_city, Config, FlightSearch, SearchRequest};
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "direct-flights")]
#[command(about = "Find direct flights via SerpApi, by chat or web form")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat with the flight agent (type 'quit' to exit)
    Chat,
    /// Serve the search form over HTTP
    Serve,
    /// Search once and print the direct flights as JSON
    Search {
        /// Origin airport code or city
        #[arg(short, long)]
        from: String,
        /// Destination airport code or city
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date for round trips (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the Gemini models available to GOOGLE_API_KEY
    Models,
}

/// Chat logs go to a file so they never interleave with the prompt.
fn init_logging(to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,direct_flights=info"));

    if to_file {
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&log_dir, "direct-flights.log");
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .json(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    if let Err(e) = init_logging(matches!(cli.command, Commands::Chat)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = Config::from_env()?;

    match cli.command {
        Commands::Chat => chat(config).await,
        Commands::Serve => serve(config).await,
        Commands::Search {
            from,
            to,
            date,
            return_date,
            output,
        } => search(config, &from, &to, &date, return_date.as_deref(), output).await,
        Commands::Models => list_models(config).await,
    }
}

async fn chat(config: Config) -> Result<()> {
    let model = GeminiClient::new(&config)?;
    let search = DirectFlightSearch::new(&config)?;
    let today = chrono::Local::now().date_naive();
    let mut agent = FlightAgent::new(model, search, config.model.clone(), config.fallback_models.clone(), today);

    println!("---------------------------------------------------------");
    println!("🤖 FLIGHT AGENT: Where would you like to go? (Type 'quit' to exit)");
    println!("   (Example: 'Find me a direct flight from Delhi to Mumbai for Jan 20th')");
    println!("---------------------------------------------------------");

    let mut editor = rustyline::DefaultEditor::new()?;
    loop {
        let line = match editor.readline("\nYou: ") {
            Ok(line) => line,
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(e) => return Err(e.into()),
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit") {
            break;
        }
        let _ = editor.add_history_entry(input);

        match agent.respond(input).await {
            Ok(reply) => println!("🤖 Agent: {}", reply),
            Err(e) => {
                println!("\n⚠️  Error calling the model: {}", e);
                println!("{}", e.hint());
            }
        }
    }

    info!("Chat session ended");
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let search: Option<Arc<dyn FlightSearch>> = match DirectFlightSearch::new(&config) {
        Ok(search) => Some(Arc::new(search)),
        Err(e) => {
            warn!(error = %e, "Flight search disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        search,
        today: chrono::Local::now().date_naive(),
    });
    let app = router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Direct flights web form starting on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn search(
    config: Config,
    from: &str,
    to: &str,
    date: &str,
    return_date: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let origin = resolve_city(from)?;
    let destination = resolve_city(to)?;
    let request = SearchRequest::new(
        &origin,
        &destination,
        parse_date(date)?,
        return_date.map(parse_date).transpose()?,
    )?;
    let client = DirectFlightSearch::new(&config)?;

    println!("Searching flights from {} to {} on {}...", origin, destination, date);
    let flights = client.search_request(&request).await?;
    let json = serde_json::to_string_pretty(&flights)?;

    if let Some(output_file) = output {
        std::fs::write(&output_file, &json)?;
        println!("Results saved to {}", output_file.display());
    } else {
        println!("{}", json);
    }

    println!("\nFound {} DIRECT flights.", flights.len());
    let recommendations = recommend(&flights, DEFAULT_TOP_N, DEFAULT_TOLERANCE_PCT);
    for (i, flight) in recommendations.picks.iter().enumerate() {
        println!("{}. {} ({})", i + 1, flight.airline_label(), flight.flight_number_label());
        println!(
            "   Time: {} -> {} ({})",
            flight.departure_label(),
            flight.arrival_label(),
            flight.duration_label()
        );
        println!("   Price: {}", flight.price_label());
    }
    Ok(())
}

async fn list_models(config: Config) -> Result<()> {
    let client = GeminiClient::new(&config)?;
    let models = client.list_models().await?;

    println!("Available models (summary):\n");
    for model in models {
        println!("- {}", model.name);
        if !model.supported_generation_methods.is_empty() {
            println!("  Supported: {}", model.supported_generation_methods.join(", "));
        }
    }
    Ok(())
}
