pub mod api;
pub mod bbox;
pub mod job;
pub mod layer;
pub mod loaders;
pub mod notice;
pub mod scene;

pub use bbox::{BBox, Extent};
pub use job::{Job, JobPhase, ProcessingProgress, RemoteStatus, StatusSnapshot, VisualizationInfo};
pub use layer::{FilterValues, LayerId, LayerOrigin, LayerSource, RenderLayer};
pub use loaders::{decode_manifest, is_manifest_key, Manifest};
pub use notice::{Notice, NoticeLevel};
pub use scene::{FileCategory, FileEntry, FileMetadata, Scene};
