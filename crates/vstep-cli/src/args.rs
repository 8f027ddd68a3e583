//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Validate vision workflow steps and run keypoint detection on an inference server
#[derive(Parser, Debug)]
#[command(name = "vstep", author, version, about, long_about = None)]
pub struct Cli {
    /// Inference server URL
    #[arg(long, global = true, env = "INFERENCE_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// API key sent with model loading and inference calls
    #[arg(long, global = true, env = "INFERENCE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a workflow definition and report every problem found
    Validate {
        /// Workflow definition (JSON)
        #[arg(value_name = "FILE")]
        workflow: PathBuf,
    },

    /// Print a JSON Schema
    Schema {
        #[arg(long, value_enum, default_value_t = SchemaKind::Keypoints)]
        step: SchemaKind,
    },

    /// Bind a keypoint step and run it against the inference server
    Infer {
        /// Workflow definition (JSON)
        #[arg(long, value_name = "FILE")]
        workflow: PathBuf,

        /// Name of the KeypointsDetectionModel step to run
        #[arg(long)]
        step: String,

        /// Image file or directory of images, repeatable. One request is sent per image
        #[arg(long = "image", value_name = "PATH", required = true)]
        images: Vec<PathBuf>,

        /// Runtime input value, repeatable. `name=value` passes a string,
        /// `name:=value` passes JSON (numbers, booleans, lists)
        #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
        params: Vec<(String, serde_json::Value)>,
    },

    /// Manage models loaded by the inference server
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// Show inference server metadata
    ServerInfo,

    /// Inspect or clear the local model cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// List loaded models
    List,
    /// Load a model
    Load { model_id: String },
    /// Unload a model
    Unload { model_id: String },
    /// Unload every model
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cache directory
    Path {
        #[arg(long)]
        model_id: Option<String>,
    },
    /// Remove cached artefacts
    Clear {
        #[arg(long)]
        model_id: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// KeypointsDetectionModel step manifest
    Keypoints,
    /// Crop step manifest
    Crop,
    /// Keypoint detection output record
    Output,
    /// Whole workflow definition
    Workflow,
}

/// Parse `name=string` or `name:=json`.
pub fn parse_param(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE or NAME:=JSON, got '{}'", raw))?;
    let (name, value) = match name.strip_suffix(':') {
        Some(name) => {
            let json = serde_json::from_str(value)
                .map_err(|e| format!("invalid JSON for '{}': {}", name, e))?;
            (name, json)
        }
        None => (name, serde_json::Value::String(value.to_string())),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing input name in '{}'", raw));
    }
    Ok((name.to_string(), value))
}
