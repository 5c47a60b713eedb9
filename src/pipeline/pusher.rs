use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ArtifactError;
use crate::model::LinearRegression;
use crate::pipeline::{
    DataTransformationArtifact, ModelEvaluationArtifact, ModelPusherArtifact,
    ModelTrainerArtifact,
};
use crate::registry::{
    load_object, save_object, sha256_file, ArtifactChecksum, ModelResolver, ModelVersion,
    VersionManifest, MANIFEST_FILE_NAME, MODEL_FILE_NAME, TARGET_ENCODER_FILE_NAME,
    TRANSFORMER_FILE_NAME,
};
use crate::transform::{LabelEncoder, Transformer};

/// Claims `version` by creating its directory. Fails if another run got
/// there first.
pub fn claim_version_dir(
    resolver: &ModelResolver,
    version: ModelVersion,
) -> Result<PathBuf, ArtifactError> {
    let registry = resolver.registry();
    fs::create_dir_all(registry).map_err(|source| ArtifactError::Io {
        path: registry.to_path_buf(),
        source,
    })?;
    let dir = resolver.version_dir(version);
    match fs::create_dir(&dir) {
        Ok(()) => Ok(dir),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            Err(ArtifactError::VersionExists { path: dir })
        }
        Err(source) => Err(ArtifactError::Io { path: dir, source }),
    }
}

fn copy_artifact<T: Serialize + DeserializeOwned>(
    from: &Path,
    dir: &Path,
    file_name: &str,
) -> Result<ArtifactChecksum, ArtifactError> {
    let value: T = load_object(from)?;
    let to = dir.join(file_name);
    save_object(&to, &value)?;
    Ok(ArtifactChecksum {
        file_name: file_name.to_string(),
        sha256: sha256_file(&to)?,
    })
}

/// Writes the accepted run's objects into `version`. The manifest goes in
/// last, so a version with a manifest is complete. On any failure after the
/// claim the version directory is removed again, so the number stays free
/// and resolution never sees a half-written version.
pub fn push_version(
    resolver: &ModelResolver,
    version: ModelVersion,
    transformation: &DataTransformationArtifact,
    trainer: &ModelTrainerArtifact,
    evaluation: &ModelEvaluationArtifact,
) -> Result<ModelPusherArtifact, ArtifactError> {
    let version_dir = claim_version_dir(resolver, version)?;
    if let Err(err) = fill_version_dir(&version_dir, version, transformation, trainer, evaluation)
    {
        if let Err(cleanup) = fs::remove_dir_all(&version_dir) {
            warn!(
                "could not release version dir {}: {cleanup}",
                version_dir.display()
            );
        }
        return Err(err);
    }
    info!("promoted model version {version} to {}", version_dir.display());
    Ok(ModelPusherArtifact {
        version,
        version_dir,
    })
}

fn fill_version_dir(
    version_dir: &Path,
    version: ModelVersion,
    transformation: &DataTransformationArtifact,
    trainer: &ModelTrainerArtifact,
    evaluation: &ModelEvaluationArtifact,
) -> Result<(), ArtifactError> {
    let artifacts = vec![
        copy_artifact::<Transformer>(
            &transformation.transform_object_path,
            version_dir,
            TRANSFORMER_FILE_NAME,
        )?,
        copy_artifact::<LinearRegression>(&trainer.model_path, version_dir, MODEL_FILE_NAME)?,
        copy_artifact::<LabelEncoder>(
            &transformation.target_encoder_path,
            version_dir,
            TARGET_ENCODER_FILE_NAME,
        )?,
    ];
    let manifest = VersionManifest {
        version,
        created_at: Utc::now(),
        r2_train_score: trainer.r2_train_score,
        r2_test_score: trainer.r2_test_score,
        improved_accuracy: evaluation.improved_accuracy,
        artifacts,
    };
    save_object(&version_dir.join(MANIFEST_FILE_NAME), &manifest)
}

pub fn initiate_model_pusher(
    transformation: &DataTransformationArtifact,
    trainer: &ModelTrainerArtifact,
    evaluation: &ModelEvaluationArtifact,
    resolver: &ModelResolver,
) -> Result<ModelPusherArtifact, ArtifactError> {
    let version = resolver.next_version()?;
    push_version(resolver, version, transformation, trainer, evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RunLayout;
    use crate::registry::load_verified;

    fn staged_run(root: &Path) -> (DataTransformationArtifact, ModelTrainerArtifact) {
        let layout = RunLayout::at(root.join("run"));
        save_object(
            &layout.transformer_file(),
            &Transformer {
                feature_names_in: vec!["age".to_string()],
                fill_value: 0.0,
                centers: vec![30.0],
                scales: vec![10.0],
            },
        )
        .expect("transformer");
        save_object(&layout.target_encoder_file(), &LabelEncoder::default()).expect("encoder");
        save_object(
            &layout.model_file(),
            &LinearRegression {
                intercept: 1.0,
                coefficients: vec![2.0],
            },
        )
        .expect("model");
        (
            DataTransformationArtifact {
                transform_object_path: layout.transformer_file(),
                target_encoder_path: layout.target_encoder_file(),
                transformed_train_path: layout.transformed_train_file(),
                transformed_test_path: layout.transformed_test_file(),
            },
            ModelTrainerArtifact {
                model_path: layout.model_file(),
                r2_train_score: 0.9,
                r2_test_score: 0.88,
            },
        )
    }

    fn accepted() -> ModelEvaluationArtifact {
        ModelEvaluationArtifact {
            is_model_accepted: true,
            improved_accuracy: None,
            current_score: 0.88,
            previous_score: None,
            previous_version: None,
        }
    }

    #[test]
    fn first_push_lands_in_version_zero_with_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = ModelResolver::new(dir.path().join("saved_models"));
        let (transformation, trainer) = staged_run(dir.path());

        let pushed = initiate_model_pusher(&transformation, &trainer, &accepted(), &resolver)
            .expect("push");
        assert_eq!(pushed.version, ModelVersion::FIRST);
        let manifest: VersionManifest =
            load_object(&pushed.version_dir.join(MANIFEST_FILE_NAME)).expect("manifest");
        assert_eq!(manifest.artifacts.len(), 3);
        let model: LinearRegression =
            load_verified(&resolver.get_latest_model_path().expect("latest")).expect("model");
        assert_eq!(model.coefficients, vec![2.0]);
    }

    #[test]
    fn second_claim_of_same_version_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = ModelResolver::new(dir.path().join("saved_models"));
        let (transformation, trainer) = staged_run(dir.path());

        // both runs resolved the same next version before either pushed
        let version = resolver.next_version().expect("next");
        let racing = resolver.next_version().expect("next");
        assert_eq!(version, racing);

        push_version(&resolver, version, &transformation, &trainer, &accepted()).expect("first");
        let err = push_version(&resolver, racing, &transformation, &trainer, &accepted())
            .expect_err("second");
        assert!(matches!(err, ArtifactError::VersionExists { .. }));
        assert_eq!(resolver.list_versions().expect("list"), vec![ModelVersion::FIRST]);
    }

    #[test]
    fn failed_push_releases_its_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = ModelResolver::new(dir.path().join("saved_models"));
        let (transformation, trainer) = staged_run(dir.path());
        let broken = ModelTrainerArtifact {
            model_path: dir.path().join("run/missing/model.json"),
            ..trainer.clone()
        };

        initiate_model_pusher(&transformation, &broken, &accepted(), &resolver)
            .expect_err("model file is missing");
        assert!(!resolver.version_dir(ModelVersion::FIRST).exists());
        assert!(resolver.list_versions().expect("list").is_empty());
        assert!(resolver.get_latest_dir_path().expect("latest").is_none());

        let pushed = initiate_model_pusher(&transformation, &trainer, &accepted(), &resolver)
            .expect("retry");
        assert_eq!(pushed.version, ModelVersion::FIRST);
        let model: LinearRegression =
            load_verified(&resolver.get_latest_model_path().expect("latest")).expect("model");
        assert_eq!(model.intercept, 1.0);
    }
}
