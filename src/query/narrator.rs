//! Answer synthesizer (C9, spec §4.9). `narrate(intent, entities, rows) ->
//! text`, injected as a capability so the core depends on no particular
//! provider (spec §9).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{AnswerConfig, LlmConfig};
use crate::models::{EntityBag, Intent, TableData};
use crate::query::executor::display_value;

#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, intent: Intent, entities: &EntityBag, rows: Option<&TableData>) -> String;
}

/// OpenAI-compatible chat completion client, used when the natural-language
/// summary benefits from a free-form model rather than a template.
pub struct HttpNarrator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model_name: String,
    fallback: TemplateNarrator,
}

impl HttpNarrator {
    pub fn new(config: &LlmConfig, answer_config: AnswerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .build()
            .expect("reqwest client");
        Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
            fallback: TemplateNarrator { config: answer_config },
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl Narrator for HttpNarrator {
    async fn narrate(&self, intent: Intent, entities: &EntityBag, rows: Option<&TableData>) -> String {
        let prompt = self.fallback.build_prompt(intent, entities, rows);
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));

        let result = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model_name,
                messages: vec![ChatMessage { role: "user", content: &prompt }],
                max_tokens: 200,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status());

        // Embedding/LLM faults on the read path degrade rather than fail
        // the query (spec §7): fall back to the deterministic template.
        match result {
            Ok(resp) => match resp.json::<ChatResponse>().await {
                Ok(parsed) => parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .unwrap_or_else(|| self.fallback.narrate_sync(intent, entities, rows)),
                Err(e) => {
                    tracing::warn!(error = %e, "narration response unparsable, using template");
                    self.fallback.narrate_sync(intent, entities, rows)
                },
            },
            Err(e) => {
                tracing::warn!(error = %e, "narration backend unavailable, using template");
                self.fallback.narrate_sync(intent, entities, rows)
            },
        }
    }
}

/// Deterministic, LLM-free narrator. Default when no LLM is configured and
/// the always-available fallback for a degraded `HttpNarrator`.
pub struct TemplateNarrator {
    pub config: AnswerConfig,
}

impl TemplateNarrator {
    fn build_prompt(&self, intent: Intent, entities: &EntityBag, rows: Option<&TableData>) -> String {
        format!(
            "Summarize this Argo float query result in at most {} sentences. \
             Intent: {}. Regions: {:?}. Rows available: {}.",
            self.config.max_sentences_data,
            intent.as_str(),
            entities.regions,
            rows.map(|r| r.total_rows).unwrap_or(0)
        )
    }

    fn narrate_sync(&self, intent: Intent, entities: &EntityBag, rows: Option<&TableData>) -> String {
        if intent == Intent::Informational {
            return "Argo floats are autonomous instruments that drift with ocean currents, \
                     periodically diving to depth and surfacing while recording temperature, \
                     salinity, and pressure. Thousands are deployed worldwide as part of the \
                     international Argo program. Each float reports a vertical profile, called a \
                     cycle, every several days."
                .to_string();
        }

        let Some(table) = rows else {
            return "No rows were returned for this query; try broadening the region, \
                    time window, or parameter filter."
                .to_string();
        };

        if table.total_rows == 0 {
            return "No matching data was found; try broadening the region, time window, \
                    or parameter filter."
                .to_string();
        }

        let mut sentence_parts = Vec::new();

        if let Some(region) = entities.regions.first() {
            sentence_parts.push(format!("In the {region} region"));
        } else if let Some(float_id) = entities.float_ids.first() {
            sentence_parts.push(format!("For float {float_id}"));
        }

        let headline = format!("{} rows matched", table.total_rows);
        let depth_note = if table.columns.iter().any(|c| c == "depth_range") {
            format!(" across {} depth bands", table.total_rows)
        } else {
            String::new()
        };

        let summary = if sentence_parts.is_empty() {
            format!("{headline}{depth_note}.")
        } else {
            format!("{}, {headline}{depth_note}.", sentence_parts.join(", "))
        };

        let mut sentences = vec![summary];
        if let Some(stats) = aggregate_stats_sentence(table) {
            sentences.push(stats);
        }
        sentences.truncate(self.config.max_sentences_data.max(1));
        sentences.join(" ")
    }
}

/// Cites the mean and range of whichever parameter an analytical query
/// aggregated, read from the first depth band's row (spec §4.9).
fn aggregate_stats_sentence(table: &TableData) -> Option<String> {
    let avg_column = table.columns.iter().find(|c| c.starts_with("avg_"))?;
    let parameter = avg_column.strip_prefix("avg_")?;
    let min_column = format!("min_{parameter}");
    let max_column = format!("max_{parameter}");
    let row = table.rows.first()?;

    let avg = display_value(row, avg_column)?;
    let min = display_value(row, &min_column)?;
    let max = display_value(row, &max_column)?;

    Some(format!("Mean {parameter} was {avg:.2}, ranging {min:.2} to {max:.2}."))
}

#[async_trait]
impl Narrator for TemplateNarrator {
    async fn narrate(&self, intent: Intent, entities: &EntityBag, rows: Option<&TableData>) -> String {
        self.narrate_sync(intent, entities, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnswerConfig {
        AnswerConfig { max_sentences_informational: 4, max_sentences_data: 4 }
    }

    #[tokio::test]
    async fn informational_intent_never_touches_rows() {
        let narrator = TemplateNarrator { config: config() };
        let entities = EntityBag::default();
        let text = narrator.narrate(Intent::Informational, &entities, None).await;
        assert!(!text.is_empty());
        let sentence_count = text.matches('.').count();
        assert!((2..=4).contains(&sentence_count), "got {sentence_count} sentences: {text}");
    }

    #[tokio::test]
    async fn empty_rows_say_so() {
        let narrator = TemplateNarrator { config: config() };
        let entities = EntityBag::default();
        let table = TableData { columns: vec![], rows: vec![], total_rows: 0 };
        let text = narrator.narrate(Intent::Spatial, &entities, Some(&table)).await;
        assert!(text.to_lowercase().contains("no matching data") || text.to_lowercase().contains("broaden"));
    }

    #[tokio::test]
    async fn data_summary_mentions_region() {
        let narrator = TemplateNarrator { config: config() };
        let entities = EntityBag { regions: vec!["arabian sea".to_string()], ..Default::default() };
        let table = TableData { columns: vec!["avg_temperature".to_string()], rows: vec![], total_rows: 5 };
        let text = narrator.narrate(Intent::Spatial, &entities, Some(&table)).await;
        assert!(text.to_lowercase().contains("arabian sea"));
    }
}
