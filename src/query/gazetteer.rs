//! Region gazetteer (spec §4.6, GLOSSARY): static name → bounding box map.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

pub struct Gazetteer {
    regions: HashMap<String, BoundingBox>,
}

impl Default for Gazetteer {
    fn default() -> Self {
        let mut regions = HashMap::new();
        regions.insert(
            "arabian sea".to_string(),
            BoundingBox { lat_min: 10.0, lat_max: 25.0, lon_min: 50.0, lon_max: 75.0 },
        );
        regions.insert(
            "bay of bengal".to_string(),
            BoundingBox { lat_min: 5.0, lat_max: 22.0, lon_min: 80.0, lon_max: 100.0 },
        );
        regions.insert(
            "indian ocean".to_string(),
            BoundingBox { lat_min: -40.0, lat_max: 30.0, lon_min: 20.0, lon_max: 120.0 },
        );
        regions.insert(
            "equatorial indian ocean".to_string(),
            BoundingBox { lat_min: -10.0, lat_max: 10.0, lon_min: 40.0, lon_max: 100.0 },
        );
        regions.insert(
            "southern ocean".to_string(),
            BoundingBox { lat_min: -70.0, lat_max: -40.0, lon_min: -180.0, lon_max: 180.0 },
        );
        Self { regions }
    }
}

impl Gazetteer {
    pub fn lookup(&self, name: &str) -> Option<BoundingBox> {
        self.regions.get(&name.to_lowercase()).copied()
    }

    /// Regions whose name appears in `text` (case-insensitive), longest
    /// match first so "bay of bengal" wins over a hypothetical "bengal".
    pub fn find_in_text(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut hits: Vec<&str> =
            self.regions.keys().filter(|name| lower.contains(name.as_str())).map(|s| s.as_str()).collect();
        hits.sort_by_key(|b| std::cmp::Reverse(b.len()));
        hits.into_iter().map(String::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_named_region_in_free_text() {
        let gazetteer = Gazetteer::default();
        let hits = gazetteer.find_in_text("Show me temperature in the Arabian Sea");
        assert_eq!(hits, vec!["arabian sea"]);
    }

    #[test]
    fn unknown_region_has_no_bbox() {
        let gazetteer = Gazetteer::default();
        assert!(gazetteer.lookup("atlantis").is_none());
    }
}
