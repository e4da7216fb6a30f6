//! The `autograde list-models` command.

use std::path::PathBuf;

use anyhow::Result;

use autograde_core::traits::ModelInfo;
use autograde_providers::config::{load_config_from, provider_config_for};
use autograde_providers::ollama::OllamaProvider;
use autograde_providers::{create_provider, ProviderConfig};

pub async fn execute(provider_filter: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let providers: Vec<(String, ProviderConfig)> = match &provider_filter {
        Some(name) => vec![(name.clone(), provider_config_for(&config, name)?)],
        None => {
            let mut all: Vec<_> = config
                .providers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            all.sort_by(|a, b| a.0.cmp(&b.0));
            all
        }
    };

    let mut found_any = false;

    for (name, provider_config) in &providers {
        let models = match provider_config {
            ProviderConfig::Ollama { base_url } => {
                match OllamaProvider::new(base_url)?.list_models_async().await {
                    Ok(models) => models,
                    Err(e) => {
                        eprintln!("Provider {name}: {e:#}");
                        continue;
                    }
                }
            }
            other => create_provider(other)?.available_models(),
        };

        if !models.is_empty() {
            found_any = true;
            println!("Provider: {name}");
            for model in &models {
                print_model(model);
            }
            println!();
        }
    }

    if !found_any {
        println!("No providers configured. Run `autograde init` to create a config file.");
    }

    Ok(())
}

fn print_model(model: &ModelInfo) {
    if model.max_context == 0 {
        println!("  {} (local)", model.id);
    } else {
        println!(
            "  {}: {} ({}K context, ${:.5}/{:.5} per 1K tokens)",
            model.id,
            model.name,
            model.max_context / 1000,
            model.cost_per_1k_input,
            model.cost_per_1k_output,
        );
    }
}
