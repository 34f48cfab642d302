//! Translate command - one translation against the configured backends

use std::io::Write;

use clap::Args;
use futures::StreamExt;
use serde::Serialize;

use crate::config::AppConfig;
use crate::domain::checkpoint::TenantKey;
use crate::domain::translate::TranslateInput;
use crate::infrastructure::logging::init_logging;

#[derive(Debug, Args)]
pub struct TranslateArgs {
    /// Direction key, `dev_to_pm` or `pm_to_dev`
    #[arg(long)]
    pub direction: Option<String>,

    /// Extra context passed to the translation prompt
    #[arg(long)]
    pub context: Option<String>,

    /// Tenant whose checkpoint store records the run
    #[arg(long, default_value = crate::domain::checkpoint::DEFAULT_TENANT)]
    pub tenant: String,

    /// Print only the final result instead of every event
    #[arg(long)]
    pub no_stream: bool,

    /// Content to translate
    pub content: String,
}

impl TranslateArgs {
    fn input(&self) -> TranslateInput {
        TranslateInput {
            content: self.content.clone(),
            context: self.context.clone(),
            direction: self.direction.clone(),
            model: None,
        }
    }
}

pub async fn run(args: TranslateArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    init_logging(&config.logging)?;

    let state = crate::create_app_state(&config)?;
    let tenant = TenantKey::new(args.tenant.clone());
    let stdout = std::io::stdout();

    if args.no_stream {
        let result = state.agent.translate(&tenant, args.input()).await?;
        print_json_line(&mut stdout.lock(), &result)?;
        return Ok(());
    }

    let mut events = state.agent.translate_stream(&tenant, args.input());
    while let Some(event) = events.next().await {
        print_json_line(&mut stdout.lock(), &event)?;
    }

    Ok(())
}

fn print_json_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::translate::TranslateEvent;

    #[test]
    fn test_print_json_line() {
        let mut out = Vec::new();
        let event = TranslateEvent::ContentDelta {
            delta: "hi".to_string(),
        };

        print_json_line(&mut out, &event).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"event\":\"content_delta\",\"data\":{\"delta\":\"hi\"}}\n"
        );
    }

    #[test]
    fn test_input_from_args() {
        let args = TranslateArgs {
            direction: Some("dev_to_pm".to_string()),
            context: None,
            tenant: "public".to_string(),
            no_stream: false,
            content: "Added retries".to_string(),
        };

        let input = args.input();
        assert_eq!(input.content, "Added retries");
        assert_eq!(input.direction_key(), Some("dev_to_pm"));
    }
}
