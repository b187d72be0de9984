/*!
Enregistreur d'appels pour les mocks

Les mocks du runtime, du volume ou du vérificateur de mises à jour
enregistrent chaque appel ici; les tests comptent ensuite les appels.
*/

use std::sync::{Arc, Mutex};

/// Journal d'appels partagé entre un mock et le test qui l'inspecte
#[derive(Debug, Clone, Default)]
pub struct CallRecorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        let call = call.into();
        log::debug!("[MOCK] call: {}", call);
        self.calls.lock().unwrap().push(call);
    }

    /// Nombre d'appels portant exactement ce nom
    pub fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == call)
            .count()
    }

    /// Tous les appels, dans l'ordre
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_are_shared_between_clones() {
        let recorder = CallRecorder::new();
        let mock_side = recorder.clone();

        mock_side.record("start");
        mock_side.record("is_running");
        mock_side.record("is_running");

        assert_eq!(recorder.count("is_running"), 2);
        assert_eq!(recorder.count("stop"), 0);
        assert_eq!(recorder.calls(), vec!["start", "is_running", "is_running"]);

        recorder.clear();
        assert!(mock_side.calls().is_empty());
    }
}
