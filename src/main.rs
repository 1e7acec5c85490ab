use pdf_x_extract::{
    ExtractOptions, ExtractionResponse, HealthStatus, extract_with_options, payload_bytes,
    self_check,
};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn usage(program: &str) -> ! {
    eprintln!("PDF Extraction Inspector");
    eprintln!("Usage: {} <pdf-file> [options]", program);
    eprintln!("       {} --health", program);
    eprintln!("\nThe file may contain raw PDF bytes or a base64 payload.");
    eprintln!("\nOptions:");
    eprintln!("  --max-pages <n>     Fail if the page tree has more than n pages");
    eprintln!("  --max-bytes <n>     Fail if any stream decodes to more than n bytes");
    eprintln!("  --timeout-ms <n>    Wall-clock budget for the whole document");
    eprintln!("  --sequential        Interpret pages on the calling thread");
    eprintln!("  --compact           Print single-line JSON");
    eprintln!("  --text              Print extracted text instead of JSON");
    eprintln!("  --health            Run the self check and print the health status");
    eprintln!("\nSet RUST_LOG=debug for parser progress.");
    process::exit(1);
}

/// Parses the value following `flag`, exiting with a message if it is
/// missing or not a number.
fn numeric_option<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    let pos = args.iter().position(|arg| arg == flag)?;
    match args.get(pos + 1).map(|v| v.parse::<T>()) {
        Some(Ok(value)) => Some(value),
        _ => {
            eprintln!("Error: {} requires a number", flag);
            process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T, compact: bool) {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let compact = args.iter().any(|x| x == "--compact");

    if args.iter().any(|x| x == "--health") {
        let status = HealthStatus::from_check(self_check());
        print_json(&status, compact);
        if !status.is_healthy() {
            process::exit(1);
        }
        return;
    }

    let Some(pdf_path) = args.get(1).filter(|a| !a.starts_with("--")) else {
        usage(args.first().map(String::as_str).unwrap_or("pdf-inspect"));
    };

    if !Path::new(pdf_path).exists() {
        eprintln!("Error: File not found: {}", pdf_path);
        process::exit(1);
    }

    let mut options = ExtractOptions::default();
    if let Some(max_pages) = numeric_option(&args, "--max-pages") {
        options = options.with_max_pages(max_pages);
    }
    if let Some(max_bytes) = numeric_option(&args, "--max-bytes") {
        options = options.with_max_decoded_bytes(max_bytes);
    }
    if let Some(timeout_ms) = numeric_option(&args, "--timeout-ms") {
        options = options.with_max_duration_ms(timeout_ms);
    }
    if args.iter().any(|x| x == "--sequential") {
        options = options.with_parallel(false);
    }

    let payload = match fs::read(pdf_path) {
        Ok(payload) => payload,
        Err(e) => {
            eprintln!("Error reading {}: {}", pdf_path, e);
            process::exit(1);
        }
    };
    let pdf = payload_bytes(&payload);
    log::info!("Extracting {} ({} bytes)", pdf_path, pdf.len());

    let name = Path::new(pdf_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| pdf_path.clone());
    let result = extract_with_options(&pdf, &options);

    if args.iter().any(|x| x == "--text") {
        match result {
            Ok(result) => println!("{}", result.text()),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let response = ExtractionResponse::from_result(&name, result);
    if let Some(data) = &response.data {
        let diagnostics = data.all_diagnostics().count();
        if diagnostics > 0 {
            log::info!("{} diagnostics recorded", diagnostics);
        }
    }
    print_json(&response, compact);
    if !response.success {
        process::exit(1);
    }
}
