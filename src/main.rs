use bird_deck::utils::{logger, validation::Validate};
use bird_deck::{BirdPipeline, CliConfig, EtlEngine, EtlError, LocalStorage};
use clap::Parser;

// Requests are made strictly one after another; no worker threads needed.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose, cli.log_json);
    tracing::info!("Starting bird-deck");
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: CliConfig) -> Result<(), EtlError> {
    let config = cli.into_deck_config()?;

    // 驗證配置
    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated successfully");

    let storage = LocalStorage::new(config.output.output_dir.clone());
    let pipeline = BirdPipeline::new(storage, config)?;
    let engine = EtlEngine::new(pipeline);

    let summary = engine.run().await?;

    tracing::info!("✅ Deck build completed successfully!");
    println!("✅ Wrote {} birds to {}", summary.rows_written, summary.deck_path);
    println!("🖼  Downloaded {} images", summary.images_written);
    if let Some(json) = &summary.json_path {
        println!("📁 Data saved to {}", json);
    }

    Ok(())
}
