pub mod manifest_loader;

pub use manifest_loader::{decode_manifest, is_manifest_key, parse_mtl, Manifest, ManifestFileInfo};
