//! `deepsearch doctor` — Diagnose configuration and connectivity.

use deepsearch_config::AppConfig;
use deepsearch_providers::router::build_from_config;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 DeepSearch Doctor — System Diagnostics");
    println!("=========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file (defaults in use) — run `deepsearch config init`");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the configuration before running other checks.");
            return Ok(());
        }
    };

    println!(
        "     Provider: {}  Model: {}  Steps: {}",
        config.default_provider, config.default_model, config.research.max_steps
    );

    if config.has_api_key() {
        println!("  ✅ LLM API key configured");
    } else {
        println!("  ❌ No LLM API key — set OPENROUTER_API_KEY or add api_key to config.toml");
        issues += 1;
    }

    if config.has_search_key() {
        println!("  ✅ Serper API key configured");
    } else {
        println!("  ⚠️  No Serper API key — searches will return no results (set SERPER_API_KEY)");
        issues += 1;
    }

    let router = build_from_config(&config);
    match router.require_default() {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  ❌ Provider '{}' responded with an error", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
