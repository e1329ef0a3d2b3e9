//! Headless driver.
//!
//!   healthiswealth <image>                    analyze a photo
//!   healthiswealth --barcode <code> <image>   analyze a photo, grounded on a known code
//!   healthiswealth --live <image>             treat the photo as a camera feed and scan it
//!   healthiswealth --text "<product name>"    analyze a typed name
//!   healthiswealth --logout                   forget the stored API key

use healthiswealth_lib::capture::{
    CodeRecognizer, EanRecognizer, FeedSource, NoFeed, NoRecognizer, ProductCode,
    StillFeedSource,
};
use healthiswealth_lib::llm::{GeminiAnalysisClient, Risk};
use healthiswealth_lib::lookup::OpenFoodFactsClient;
use healthiswealth_lib::settings::KeyringStore;
use healthiswealth_lib::{
    HealthyReport, ScanError, ScanState, Scanner, ScannerConfig, Session, View,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const USAGE: &str = "usage: healthiswealth <image> | --barcode <code> <image> | --live <image> | --text \"<name>\" | --logout";

/// How long `--live` waits for the detector before capturing manually.
const LIVE_SCAN_WINDOW: Duration = Duration::from_secs(3);

enum Command {
    Logout,
    Scan(Acquisition),
}

enum Acquisition {
    Upload(PathBuf),
    Barcode(ProductCode, PathBuf),
    Live(PathBuf),
    Text(String),
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let acquisition = match args {
            [flag] if flag == "--logout" => return Some(Command::Logout),
            [flag, text] if flag == "--text" => Acquisition::Text(text.clone()),
            [flag, path] if flag == "--live" => Acquisition::Live(PathBuf::from(path)),
            [flag, code, path] if flag == "--barcode" => {
                Acquisition::Barcode(ProductCode::new(code.as_str())?, PathBuf::from(path))
            }
            [path] if !path.starts_with("--") => Acquisition::Upload(PathBuf::from(path)),
            _ => return None,
        };
        Some(Command::Scan(acquisition))
    }
}

type DriverScanner<F, R> = Scanner<F, R, OpenFoodFactsClient, GeminiAnalysisClient, Session>;

#[tokio::main]
async fn main() -> ExitCode {
    healthiswealth_lib::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = Command::parse(&args) else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let session = Arc::new(Session::load(Box::new(KeyringStore::new())));
    let acquisition = match command {
        Command::Scan(acquisition) => acquisition,
        Command::Logout => {
            return match session.logout() {
                Ok(()) => {
                    println!("API key removed.");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::FAILURE
                }
            };
        }
    };

    if session.view() == View::Setup {
        if let Err(e) = prompt_credential(&session) {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    }
    let Some(credential) = session.credential() else {
        eprintln!("An API key is required.");
        return ExitCode::FAILURE;
    };

    let config = ScannerConfig::from_env();
    let result = match acquisition {
        Acquisition::Live(path) => {
            let frame = match image::open(&path) {
                Ok(frame) => frame,
                Err(e) => {
                    eprintln!("Could not open {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            };
            let scanner = scanner(
                &config,
                &credential,
                StillFeedSource::new(frame),
                EanRecognizer,
                &session,
            );
            run_live(&scanner, &session).await
        }
        Acquisition::Upload(path) => {
            let scanner = scanner(&config, &credential, NoFeed, NoRecognizer, &session);
            scanner.capture_upload(&path).await
        }
        Acquisition::Barcode(code, path) => {
            let scanner = scanner(&config, &credential, NoFeed, NoRecognizer, &session);
            match tokio::fs::read(&path).await {
                Ok(bytes) => scanner.capture_bytes(bytes, Some(code)).await,
                Err(e) => Err(ScanError::Upload(e)),
            }
        }
        Acquisition::Text(text) => {
            let scanner = scanner(&config, &credential, NoFeed, NoRecognizer, &session);
            scanner.submit_text(&text).await
        }
    };

    match result {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", session.last_error().unwrap_or_else(|| e.to_string()));
            if e.is_recoverable() {
                eprintln!("Run it again, or try --text with the product name.");
            }
            ExitCode::FAILURE
        }
    }
}

fn scanner<F, R>(
    config: &ScannerConfig,
    credential: &str,
    feed: F,
    recognizer: R,
    session: &Arc<Session>,
) -> Arc<DriverScanner<F, R>>
where
    F: FeedSource + 'static,
    R: CodeRecognizer + 'static,
{
    Arc::new(Scanner::new(
        config.clone(),
        credential,
        feed,
        Arc::new(recognizer),
        OpenFoodFactsClient::new(config),
        GeminiAnalysisClient::new(config),
        session.clone(),
    ))
}

/// Open the still feed, let the detector look at it, and fall back to a
/// manual capture if it finds nothing.
async fn run_live<F, R>(
    scanner: &Arc<DriverScanner<F, R>>,
    session: &Session,
) -> Result<HealthyReport, ScanError>
where
    F: FeedSource + 'static,
    R: CodeRecognizer + 'static,
{
    scanner.start_live().await?;
    if scanner.detection_available() == Some(false) {
        println!("Code detection unavailable, capturing manually.");
        return scanner.capture_manual().await;
    }

    let deadline = tokio::time::Instant::now() + LIVE_SCAN_WINDOW;
    while scanner.state() == ScanState::LiveFeedActive {
        if tokio::time::Instant::now() >= deadline {
            println!("No barcode found, capturing manually.");
            match scanner.capture_manual().await {
                // A detection got there first; its capture settles below.
                Err(ScanError::Busy | ScanError::NotReady { .. }) => break,
                other => return other,
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    if let Some(code) = scanner.last_detected_code() {
        println!("Barcode: {}", code);
    }
    // The detector's capture runs on its own task; wait until the session
    // has the outcome.
    loop {
        match (session.scan_state(), session.report()) {
            (ScanState::Done, Some(report)) => return Ok(report),
            (ScanState::Failed(_), _) => return Err(ScanError::AnalysisFailed),
            (ScanState::Idle, _) => return Err(ScanError::Discarded),
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
}

fn prompt_credential(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    print!("Gemini API key: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    session.submit_credential(&line)?;
    Ok(())
}

fn print_report(report: &HealthyReport) {
    println!();
    println!("{}", report.product_name);
    println!("Score: {}/100   Verdict: {}", report.score, report.verdict);
    println!(
        "Ingredients: {} safe, {} caution, {} danger",
        report.count_by_risk(Risk::Safe),
        report.count_by_risk(Risk::Caution),
        report.count_by_risk(Risk::Danger)
    );
    if let Some(barcode) = &report.barcode {
        println!("Barcode: {}", barcode);
    }
    if let Some(image) = &report.product_image {
        println!("Image: {}", image);
    }
    if let Some(sugar) = report.sugar_grams {
        println!("Sugar: {:.1} g", sugar);
    }
    if let Some(protein) = report.protein_grams {
        println!("Protein: {:.1} g", protein);
    }
    println!();
    println!("{}", report.analysis_text);
    println!();
    for finding in &report.ingredients {
        let risk = format!("{:?}", finding.risk).to_uppercase();
        match finding.displayed_reason() {
            Some(reason) => println!("  [{:<7}] {}: {}", risk, finding.name, reason),
            None => println!("  [{:<7}] {}", risk, finding.name),
        }
    }
}
