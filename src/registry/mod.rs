pub mod resolver;
pub mod store;
pub mod version;

pub use resolver::{
    ModelResolver, RegistryEntry, MODEL_FILE_NAME, TARGET_ENCODER_FILE_NAME, TRANSFORMER_FILE_NAME,
};
pub use store::{
    load_object, load_verified, save_object, sha256_file, ArtifactChecksum, VersionManifest,
    MANIFEST_FILE_NAME,
};
pub use version::{ModelVersion, VersionParseError};
