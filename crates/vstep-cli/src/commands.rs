//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use vstep_cache::{CacheError, ModelCache};
use vstep_client::{InferenceClient, InferenceClientConfig, NamedImage};
use vstep_models::{schema, RuntimeInputs, StepManifest, WorkflowDefinition};

use crate::args::{CacheAction, Cli, Command, ModelsAction, SchemaKind};

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        api_url,
        api_key,
        command,
    } = cli;

    let done = match command {
        Command::Validate { workflow } => {
            let code = if validate(&workflow)? {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
            return Ok(code);
        }
        Command::Schema { step } => print_json(&schema_for(step)),
        Command::Infer {
            workflow,
            step,
            images,
            params,
        } => {
            let client = client(api_url, api_key)?;
            let runtime: RuntimeInputs = params.into_iter().collect();
            infer(&client, &workflow, &step, &images, &runtime).await
        }
        Command::Models { action } => {
            let client = client(api_url, api_key)?;
            let models = match action {
                ModelsAction::List => client.list_loaded_models().await,
                ModelsAction::Load { model_id } => client.load_model(&model_id).await,
                ModelsAction::Unload { model_id } => client.unload_model(&model_id).await,
                ModelsAction::Clear => client.unload_all_models().await,
            }
            .context("Model registry call failed")?;
            print_json(&models)
        }
        Command::ServerInfo => {
            let info = client(api_url, api_key)?
                .server_info()
                .await
                .context("Failed to fetch server info")?;
            print_json(&info)
        }
        Command::Cache { action } => cache(action),
    };
    done.map(|()| ExitCode::SUCCESS)
}

fn client(api_url: Option<String>, api_key: Option<String>) -> Result<InferenceClient> {
    let mut config = InferenceClientConfig::from_env();
    if let Some(url) = api_url {
        config = config.with_api_url(url);
    }
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        config = config.with_api_key(key);
    }
    InferenceClient::new(config).context("Failed to create inference client")
}

fn load_definition(path: &Path) -> Result<WorkflowDefinition> {
    WorkflowDefinition::from_json_file(path)
        .with_context(|| format!("Failed to load workflow {}", path.display()))
}

/// Print the outcome of validation. Returns whether the definition is valid.
fn validate(path: &Path) -> Result<bool> {
    let definition = load_definition(path)?;
    match definition.validate() {
        Ok(()) => {
            println!(
                "{}: OK ({} inputs, {} steps)",
                path.display(),
                definition.inputs.len(),
                definition.steps.len()
            );
            Ok(true)
        }
        Err(errors) => {
            for error in errors.errors() {
                println!("{}: {}", path.display(), error);
            }
            Ok(false)
        }
    }
}

async fn infer(
    client: &InferenceClient,
    workflow: &Path,
    step_name: &str,
    image_paths: &[PathBuf],
    runtime: &RuntimeInputs,
) -> Result<()> {
    let definition = load_definition(workflow)?;
    definition.validate()?;

    let step = definition
        .step(step_name)
        .ok_or_else(|| anyhow!("No step named '{}'", step_name))?;
    let keypoints = match step {
        StepManifest::KeypointsDetectionModel(step) => step,
        other => bail!(
            "Step '{}' is a {} step, expected KeypointsDetectionModel",
            step_name,
            other.step_type()
        ),
    };

    if !keypoints.image.is_input() {
        warn!(
            step = %step_name,
            selector = %keypoints.image,
            "Step reads crops from another step; sending the given image as-is"
        );
    }

    let parameters = keypoints.bind(runtime, &definition.inputs)?;

    let mut images = Vec::new();
    for path in image_paths {
        images.extend(NamedImage::load(path).await?);
    }
    if images.is_empty() {
        bail!("No image files found in {:?}", image_paths);
    }
    let images = name_images(images, keypoints.image.root_name());

    info!(
        step = %step_name,
        model_id = %parameters.model_id,
        images = images.len(),
        "Running keypoint detection"
    );
    let mut outputs = client
        .infer_keypoints_batch(&parameters, &images)
        .await
        .with_context(|| format!("Inference failed for step '{}'", step_name))?;

    match outputs.len() {
        1 => print_json(&outputs.remove(0)),
        _ => print_json(&outputs),
    }
}

/// A single image reports under the step's image input; a batch keeps file names.
fn name_images(mut images: Vec<NamedImage>, image_input: &str) -> Vec<NamedImage> {
    if let [single] = images.as_mut_slice() {
        single.name = image_input.to_string();
    }
    images
}

fn cache(action: CacheAction) -> Result<()> {
    let cache = ModelCache::from_env();
    match action {
        CacheAction::Path { model_id } => {
            println!("{}", cache.cache_dir(model_id.as_deref())?.display());
            Ok(())
        }
        CacheAction::Clear { model_id } => match cache.clear(model_id.as_deref()) {
            Ok(()) => Ok(()),
            Err(CacheError::NotFound(dir)) => {
                info!(path = %dir.display(), "Nothing cached");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
    }
}

fn schema_for(kind: SchemaKind) -> schemars::schema::RootSchema {
    match kind {
        SchemaKind::Keypoints => schema::keypoints_manifest_schema(),
        SchemaKind::Crop => schema::crop_manifest_schema(),
        SchemaKind::Output => schema::keypoints_output_schema(),
        SchemaKind::Workflow => schema::workflow_schema(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_workflow(content: &serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_validate_reports_errors() {
        let valid = write_workflow(&serde_json::json!({
            "inputs": [{"type": "InferenceImage", "name": "image"}],
            "steps": [{"type": "KeypointsDetectionModel", "name": "pose", "model_id": "a/1", "image": "$inputs.image"}]
        }));
        assert!(validate(valid.path()).unwrap());

        let invalid = write_workflow(&serde_json::json!({
            "inputs": [{"type": "InferenceImage", "name": "image"}],
            "steps": [{"type": "KeypointsDetectionModel", "name": "pose", "model_id": "a/1", "image": "$inputs.missing"}]
        }));
        assert!(!validate(invalid.path()).unwrap());

        let missing = std::path::Path::new("/nonexistent/workflow.json");
        assert!(validate(missing).is_err());
    }

    #[test]
    fn test_schema_for_every_kind() {
        for kind in [
            SchemaKind::Keypoints,
            SchemaKind::Crop,
            SchemaKind::Output,
            SchemaKind::Workflow,
        ] {
            let value = serde_json::to_value(schema_for(kind)).unwrap();
            assert!(value.get("$schema").is_some());
        }
    }

    #[test]
    fn test_name_images() {
        let image = vstep_client::InferenceImage::from_bytes(b"x");
        let single = name_images(vec![NamedImage::new("frame.jpg", image.clone())], "image");
        assert_eq!(single[0].name, "image");

        let batch = name_images(
            vec![
                NamedImage::new("a.jpg", image.clone()),
                NamedImage::new("b.jpg", image),
            ],
            "image",
        );
        let names: Vec<_> = batch.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg"]);
    }
}
