/*!
Construction de documents d'historique télémétrie

Produit le même format que celui écrit par le conteneur dans le volume:
- `timestamps` : horodatages ISO-8601, du plus ancien au plus récent
- une série par métrique (`cpu_load`, `occupied_memory`, ...)
- les champs scalaires `epoch`, `epoch_avail`, `uptime`, `version`
*/

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Map, Value};

/// Builder d'historique, une entrée par échantillon
#[derive(Debug, Clone)]
pub struct HistoryBuilder {
    samples: usize,
    start: DateTime<Utc>,
    step_secs: i64,
    with_timestamps: bool,
    series: Vec<(String, Vec<Value>)>,
    scalars: Map<String, Value>,
}

impl HistoryBuilder {
    pub fn new(samples: usize) -> Self {
        Self {
            samples,
            start: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            step_secs: 10,
            with_timestamps: true,
            series: Vec::new(),
            scalars: Map::new(),
        }
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn step_secs(mut self, step_secs: i64) -> Self {
        self.step_secs = step_secs;
        self
    }

    /// Omet le champ `timestamps` (document sans données exploitables)
    pub fn without_timestamps(mut self) -> Self {
        self.with_timestamps = false;
        self
    }

    /// Série explicite, `None` devient `null`
    pub fn series<I>(mut self, metric: &str, values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let values = values
            .into_iter()
            .map(|v| v.map(Value::from).unwrap_or(Value::Null))
            .collect();
        self.series.push((metric.to_string(), values));
        self
    }

    /// Série linéaire `from, from + step, ...` sur tous les échantillons
    pub fn ramp(self, metric: &str, from: f64, step: f64) -> Self {
        let samples = self.samples;
        self.series(metric, (0..samples).map(|i| Some(from + step * i as f64)))
    }

    pub fn scalar(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.scalars.insert(field.to_string(), value.into());
        self
    }

    /// Scalaires typiques d'un noeud en fonctionnement
    pub fn running_node(self) -> Self {
        self.scalar("epoch", 42)
            .scalar("epoch_avail", 0.9875)
            .scalar("uptime", "1 day, 02:03:04")
            .scalar("version", "2.4.1")
    }

    pub fn timestamps(&self) -> Vec<String> {
        (0..self.samples)
            .map(|i| (self.start + Duration::seconds(self.step_secs * i as i64)).to_rfc3339())
            .collect()
    }

    pub fn build(&self) -> Value {
        let mut doc = Map::new();
        if self.with_timestamps {
            doc.insert("timestamps".to_string(), Value::from(self.timestamps()));
        }
        for (metric, values) in &self.series {
            doc.insert(metric.clone(), Value::Array(values.clone()));
        }
        for (field, value) in &self.scalars {
            doc.insert(field.clone(), value.clone());
        }
        Value::Object(doc)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.build()).expect("history document serializes")
    }
}
