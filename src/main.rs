use clap::Parser;
use knowme::config::toml_config::ScreeningConfig;
use knowme::core::engine::ServiceOutcome;
use knowme::core::{get_execution_summary, ScreeningEngine};
use knowme::domain::ports::Storage;
use knowme::utils::{loader, logger, validation::Validate};
use knowme::{build_screeners, CliArgs, LocalStorage};
use std::collections::HashMap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    dotenvy::dotenv().ok();

    match std::env::var("KNOWME_LOG_FORMAT").as_deref() {
        Ok("json") => logger::init_json_logger(),
        _ => logger::init_cli_logger(args.verbose),
    }

    tracing::info!("🚀 Starting KnowMe document screening");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match ScreeningConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 命令列覆蓋設定
    if let Some(input) = &args.input {
        config.screening.input = Some(input.clone());
        tracing::info!("🔧 Input overridden to: {}", input);
    }
    if let Some(output) = &args.output {
        config.output.path = output.clone();
        tracing::info!("🔧 Output path overridden to: {}", output);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual screening will occur");
        perform_dry_run(&config, &args)?;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let input_path = match config.input_path() {
        Some(path) => path.to_string(),
        None => {
            eprintln!("❌ No input file given; pass --input or set screening.input in the config");
            std::process::exit(1);
        }
    };

    let documents = match loader::load_documents(&input_path) {
        Ok(documents) => documents,
        Err(e) => std::process::exit(report_failure(&e)),
    };
    tracing::info!(
        "📊 Loaded {} documents from {}",
        documents.len(),
        input_path
    );

    let screeners = match build_screeners(&config, &args.services) {
        Ok(screeners) => screeners,
        Err(e) => std::process::exit(report_failure(&e)),
    };

    let output_dir = config.output_path().to_string();
    let metrics_file = config.metrics_file().to_string();
    let storage = LocalStorage::new(output_dir.clone());
    let engine = ScreeningEngine::new(storage.clone(), config, screeners)
        .with_monitoring(monitor_enabled);

    match engine.run(&documents).await {
        Ok(result) => {
            tracing::info!("✅ Screening completed successfully!");
            println!("✅ Screening completed successfully!");
            for file in &result.output_files {
                println!("📁 Output saved to: {}/{}", output_dir, file);
            }

            for outcome in result.outcomes.iter().filter(|o| o.error.is_some()) {
                println!("⏭️ {} failed and contributed no columns", outcome.service);
            }

            let summary = get_execution_summary(&result.outcomes);
            println!(
                "📊 {} service(s), {} failed, {} rows in {} ms",
                summary["total_services"],
                summary["failed_services"],
                summary["total_rows"],
                summary["total_duration_ms"]
            );

            if monitor_enabled {
                export_execution_metrics(&storage, &result.outcomes, &metrics_file).await?;
            }
        }
        Err(e) => {
            let exit_code = report_failure(&e);
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn report_failure(e: &knowme::ScreeningError) -> i32 {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Screening failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Sugerencia: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    match e.severity() {
        knowme::utils::error::ErrorSeverity::Low => 0, // 警告，但成功
        knowme::utils::error::ErrorSeverity::Medium => 2, // 重試錯誤
        knowme::utils::error::ErrorSeverity::High => 1, // 處理錯誤
        knowme::utils::error::ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

fn display_config_summary(config: &ScreeningConfig, args: &CliArgs) {
    println!("📋 Configuration Summary:");
    println!(
        "  Screening: {} v{}",
        config.screening.name, config.screening.version
    );
    println!("  Input: {}", config.input_path().unwrap_or("(not set)"));
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output.output_formats.join(", "));

    let enabled = config.enabled_services();
    let names: Vec<&str> = enabled.iter().map(|s| s.name.as_str()).collect();
    println!("  Services: {}", names.join(", "));

    if !args.services.is_empty() {
        println!("  Selected: {}", args.services.join(", "));
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &ScreeningConfig, args: &CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📡 Services:");
    for service in config.enabled_services() {
        let selected =
            args.services.is_empty() || args.services.iter().any(|s| s == &service.name);
        let marker = if selected { "✅" } else { "⏭️" };
        match service.r#type.as_str() {
            "sdn" | "lista_eu" => println!(
                "  {} {} ({}) dataset: {}",
                marker,
                service.name,
                service.r#type,
                service.dataset.as_deref().unwrap_or("-")
            ),
            _ => println!(
                "  {} {} ({}) url: {}",
                marker,
                service.name,
                service.r#type,
                service.url.as_deref().unwrap_or("-")
            ),
        }
    }

    println!();
    if let Some(input) = config.input_path() {
        match loader::load_documents(input) {
            Ok(documents) => {
                println!("📊 Input: {} documents from {}", documents.len(), input);
            }
            Err(e) => {
                println!("❌ Input check failed: {}", e.user_friendly_message());
            }
        }
    } else {
        println!("❌ No input file configured");
    }

    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output_path());
    println!("  Formats: {}", config.output.output_formats.join(", "));
    if let Some(compression) = &config.output.compression {
        if compression.enabled {
            println!("  Compression: {} (ZIP)", compression.filename);
        }
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");

    Ok(())
}

async fn export_execution_metrics(
    storage: &LocalStorage,
    outcomes: &[ServiceOutcome],
    metrics_file: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let execution_id = format!("knowme_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"));

    let mut metrics = HashMap::new();
    metrics.insert(
        "execution_id",
        serde_json::Value::String(execution_id),
    );
    metrics.insert(
        "timestamp",
        serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
    );

    let summary = get_execution_summary(outcomes);
    metrics.insert(
        "summary",
        serde_json::Value::Object(summary.into_iter().collect()),
    );

    let service_metrics: Vec<serde_json::Value> = outcomes
        .iter()
        .map(|outcome| {
            let mut service_data = HashMap::new();
            service_data.insert(
                "name".to_string(),
                serde_json::Value::String(outcome.service.clone()),
            );
            service_data.insert(
                "rows".to_string(),
                serde_json::Value::Number(outcome.row_count.into()),
            );
            service_data.insert(
                "duration_ms".to_string(),
                serde_json::Value::Number((outcome.duration.as_millis() as u64).into()),
            );
            if let Some(error) = &outcome.error {
                service_data.insert(
                    "error".to_string(),
                    serde_json::Value::String(error.clone()),
                );
            }

            serde_json::Value::Object(service_data.into_iter().collect())
        })
        .collect();

    metrics.insert("services", serde_json::Value::Array(service_metrics));

    let metrics_json = serde_json::to_string_pretty(&metrics)?;
    storage.write_file(metrics_file, metrics_json.as_bytes()).await?;

    tracing::info!("📊 Execution metrics exported to: {}", metrics_file);
    println!("📊 Metrics exported to: {}", metrics_file);

    Ok(())
}
