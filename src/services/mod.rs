pub mod band_selection;
pub mod export_service;
pub mod file_classifier;
pub mod layer_registry;
pub mod map_controller;
pub mod render_pipeline;
pub mod scene_catalog;

pub use band_selection::{BandSelectionManager, SelectedBand, Selection};
pub use export_service::ExportArtifact;
pub use layer_registry::{LayerRegistry, COLOR_MAPS};
pub use map_controller::{BBoxCapture, CaptureState, MapInteractionController, ViewAnimation, ViewState};
pub use render_pipeline::{FilterChain, FilterOp, FilterScope};
pub use scene_catalog::{SceneCatalog, SceneLoad, ScenePrefixes};
