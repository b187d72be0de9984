/*!
# Edge Node DevKit - Fixtures pour les tests du lanceur

Bibliothèque facilitant l'écriture de tests du lanceur avec:
- Construction de fichiers d'historique télémétrie réalistes
- Volume partagé temporaire (fichier d'adresse + historique)
- Enregistreur d'appels pour les mocks (assertions sur le nombre d'appels)
*/

pub mod history;
pub mod recorder;
pub mod volume;

pub use history::HistoryBuilder;
pub use recorder::CallRecorder;
pub use volume::VolumeFixture;
