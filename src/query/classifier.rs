//! Query intent classifier (C6, spec §4.6). A pure function over keyword/
//! regex matching and the gazetteer — deterministic by construction, no
//! network or LLM call.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{EntityBag, Intent, Parameter};
use crate::query::gazetteer::Gazetteer;

static FLOAT_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfloat\s+(?:id\s+)?(\d{5,8})\b").unwrap());
static BARE_FLOAT_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{7})\b").unwrap());

const SEMANTIC_PHRASES: &[&str] =
    &["pattern", "similar to", "like the", "anomal", "unusual", "resembl"];

pub fn classify(query: &str, gazetteer: &Gazetteer) -> (Intent, EntityBag) {
    let lower = query.to_lowercase();
    let mut entities = EntityBag { raw_query: query.to_string(), ..Default::default() };

    entities.regions = gazetteer.find_in_text(&lower);
    entities.parameters = extract_parameters(&lower);
    entities.float_ids = extract_float_ids(&lower);

    let is_informational = is_informational_query(&lower);
    let is_semantic = SEMANTIC_PHRASES.iter().any(|p| lower.contains(p));
    let has_region = !entities.regions.is_empty();
    let has_float = !entities.float_ids.is_empty();
    let has_parameter = !entities.parameters.is_empty();

    let intent = if is_informational && !has_region && !has_float {
        Intent::Informational
    } else if is_semantic && (has_region || has_parameter) {
        Intent::Hybrid
    } else if is_semantic {
        Intent::Semantic
    } else if has_float {
        Intent::FloatLookup
    } else if has_region && has_parameter {
        Intent::Spatial
    } else if has_region {
        Intent::Spatial
    } else if has_parameter {
        Intent::ParameterProfile
    } else {
        Intent::Informational
    };

    (intent, entities)
}

fn is_informational_query(lower: &str) -> bool {
    const INFORMATIONAL_STARTERS: &[&str] =
        &["what is", "what are", "explain", "tell me about", "how does", "how do"];
    INFORMATIONAL_STARTERS.iter().any(|s| lower.starts_with(s) || lower.contains(s))
}

fn extract_parameters(lower: &str) -> Vec<Parameter> {
    let mut params = Vec::new();
    if lower.contains("temperature") {
        params.push(Parameter::Temperature);
    }
    if lower.contains("salinity") {
        params.push(Parameter::Salinity);
    }
    if lower.contains("pressure") {
        params.push(Parameter::Pressure);
    }
    params
}

fn extract_float_ids(lower: &str) -> Vec<String> {
    if let Some(cap) = FLOAT_ID_RE.captures(lower) {
        return vec![cap[1].to_string()];
    }
    if let Some(cap) = BARE_FLOAT_ID_RE.captures(lower) {
        return vec![cap[1].to_string()];
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informational_query_has_no_entities() {
        let gazetteer = Gazetteer::default();
        let (intent, entities) = classify("What are Argo floats?", &gazetteer);
        assert_eq!(intent, Intent::Informational);
        assert!(entities.regions.is_empty());
        assert_eq!(entities.raw_query, "What are Argo floats?");
    }

    #[test]
    fn spatial_query_extracts_region_and_parameter() {
        let gazetteer = Gazetteer::default();
        let (intent, entities) = classify("Show me temperature in the Arabian Sea", &gazetteer);
        assert_eq!(intent, Intent::Spatial);
        assert_eq!(entities.regions, vec!["arabian sea"]);
        assert_eq!(entities.parameters, vec![Parameter::Temperature]);
    }

    #[test]
    fn float_lookup_extracts_float_id() {
        let gazetteer = Gazetteer::default();
        let (intent, entities) = classify("Get data from float 1902482", &gazetteer);
        assert_eq!(intent, Intent::FloatLookup);
        assert_eq!(entities.float_ids, vec!["1902482"]);
    }

    #[test]
    fn semantic_query_has_no_sql_route() {
        let gazetteer = Gazetteer::default();
        let (intent, _) = classify("Find unusual deep-water temperature patterns", &gazetteer);
        assert_eq!(intent, Intent::Semantic);
        assert!(!intent.is_sql_only());
    }

    #[test]
    fn classification_is_deterministic() {
        let gazetteer = Gazetteer::default();
        let (intent1, _) = classify("Show me temperature in the Arabian Sea", &gazetteer);
        let (intent2, _) = classify("Show me temperature in the Arabian Sea", &gazetteer);
        assert_eq!(intent1, intent2);
    }
}
