use agent_supervisor::{
    config::Settings,
    lookup::{FailEveryOther, FlakyLookup, PopulationLookup},
    models::{ResumeDecision, RunOutcome},
    orchestrator::{Orchestrator, Strategy},
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type Input = Lines<BufReader<Stdin>>;

async fn prompt(input: &mut Input, text: &str) -> std::io::Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    input.next_line().await
}

async fn choose_strategy(input: &mut Input) -> std::io::Result<Option<Strategy>> {
    println!("Choose a routing strategy:");
    for (i, strategy) in Strategy::ALL.iter().enumerate() {
        println!("  {}. {:<9} {}", i + 1, strategy.to_string(), strategy.description());
    }

    loop {
        let Some(line) = prompt(input, "strategy> ").await? else {
            return Ok(None);
        };
        match line.parse::<Strategy>() {
            Ok(strategy) => return Ok(Some(strategy)),
            Err(e) => println!("{}", e),
        }
    }
}

/// Ask the reviewer until they give a usable decision.
async fn review(input: &mut Input, outcome: &RunOutcome) -> std::io::Result<Option<ResumeDecision>> {
    if let RunOutcome::Suspended { envelope, .. } = outcome {
        println!("\nLow-confidence answer from {} ({:.2}):", envelope.tool, envelope.confidence);
        println!("  {}", envelope.content);
    }

    loop {
        let Some(decision) = prompt(input, "approve / edit / reject? ").await? else {
            return Ok(None);
        };

        let payload = match decision.trim().to_lowercase().as_str() {
            "edit" | "e" => prompt(input, "replacement answer> ").await?,
            "reject" | "r" => prompt(input, "reason (optional)> ").await?,
            _ => None,
        };

        match ResumeDecision::parse(&decision, payload) {
            Ok(decision) => return Ok(Some(decision)),
            Err(e) => println!("{}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    if settings.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY not set, routing with the offline keyword decider");
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let Some(strategy) = choose_strategy(&mut input).await? else {
        return Ok(());
    };

    // Population fails every other call so the retry path gets exercised.
    let population = Arc::new(FlakyLookup::new(
        Arc::new(PopulationLookup),
        Arc::new(FailEveryOther::default()),
    ));
    let orchestrator = Orchestrator::from_settings(&settings, strategy, population)?;
    let session_id = uuid::Uuid::new_v4().to_string();

    info!(%strategy, %session_id, "Supervisor ready");
    println!("\nAsk about weather, coordinates, population or traffic. Type 'exit' to quit.");

    loop {
        let Some(line) = prompt(&mut input, "\nyou> ").await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") {
            break;
        }

        let mut result = orchestrator.invoke(&session_id, query).await;

        loop {
            let decision = match &result {
                Ok(outcome) if outcome.is_suspended() => review(&mut input, outcome).await?,
                _ => break,
            };
            let Some(decision) = decision else {
                return Ok(());
            };
            result = orchestrator.resume(&session_id, decision).await;
        }

        match result {
            Ok(outcome) => {
                println!("\nassistant> {}", outcome.answer().unwrap_or_default());
                if let Some(err) = &outcome.state().last_error {
                    info!(error = %err, "Run recorded an error");
                }
            }
            Err(e) => println!("\nassistant> Sorry, that request failed: {}", e),
        }
    }

    println!("Goodbye!");
    Ok(())
}
