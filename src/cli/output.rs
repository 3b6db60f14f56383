use anyhow::{Context, Result};
use clap::ValueEnum;
use swapbot_core_types::{Settlement, SwapDirection, SwapResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Render the outcome of a run for stdout.
pub fn render(result: &SwapResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human(result)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(result).context("Failed to encode result as JSON")
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(result).context("Failed to encode result as YAML")
        }
    }
}

fn human(result: &SwapResult) -> String {
    if result.success {
        let verb = match result.direction {
            SwapDirection::Buy => "bought",
            SwapDirection::Sell => "sold",
        };
        let likely = matches!(result.settlement, Some(Settlement::Likely));
        format!(
            "Successfully {} {}!{}",
            verb,
            result.token_symbol,
            if likely { " (likely)" } else { "" }
        )
    } else {
        let label = match result.direction {
            SwapDirection::Buy => "Buy",
            SwapDirection::Sell => "Sell",
        };
        format!(
            "{} failed: {}",
            label,
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapbot_core_types::SwapRequest;

    #[test]
    fn human_lines() {
        let buy = SwapRequest::buy("RCADE", 0.01).unwrap();
        let confirmed = SwapResult::done(
            &buy,
            Settlement::Confirmed {
                indicator: "css:.success".into(),
            },
        );
        assert_eq!(
            render(&confirmed, OutputFormat::Human).unwrap(),
            "Successfully bought RCADE!"
        );

        let sell = SwapRequest::sell("RCADE", 1000.0).unwrap();
        let likely = SwapResult::done(&sell, Settlement::Likely);
        assert_eq!(
            render(&likely, OutputFormat::Human).unwrap(),
            "Successfully sold RCADE! (likely)"
        );

        let failed = SwapResult::failed(&buy, "Swap button not found");
        assert_eq!(
            render(&failed, OutputFormat::Human).unwrap(),
            "Buy failed: Swap button not found"
        );
    }

    #[test]
    fn json_uses_wire_field_names() {
        let sell = SwapRequest::sell("RCADE", 1000.0).unwrap();
        let failed = SwapResult::failed(&sell, "Amount input field not found");
        let value: serde_json::Value =
            serde_json::from_str(&render(&failed, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["type"], "sell");
        assert_eq!(value["token"], "RCADE");
        assert_eq!(value["error"], "Amount input field not found");
    }
}
