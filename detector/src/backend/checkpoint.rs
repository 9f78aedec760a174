//! Checkpoint loading with layout detection.
//!
//! Training scripts save either a bare state dict or a container dict that
//! carries the weights under `model_state_dict` (or `state_dict`) next to
//! optimizer state and bookkeeping. Both have to load through one path.

use anyhow::{Context, Result, bail};
use candle_core::pickle::{Object, Stack};
use candle_core::{Device, Tensor};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Container keys tried in order before falling back to a raw mapping.
pub const WRAPPER_KEYS: [&str; 2] = ["model_state_dict", "state_dict"];

/// Container key holding the ordered class names next to the weights
pub const CLASSES_KEY: &str = "classes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointLayout {
    /// Top level is the weight mapping itself
    Raw,
    /// Weights sit under the given key of a container
    Wrapped(&'static str),
}

impl fmt::Display for CheckpointLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointLayout::Raw => write!(f, "raw state dict"),
            CheckpointLayout::Wrapped(key) => write!(f, "wrapped under '{}'", key),
        }
    }
}

pub struct Checkpoint {
    pub layout: CheckpointLayout,
    pub tensors: HashMap<String, Tensor>,
    /// Class names in output-index order, when the container records them
    pub classes: Option<Vec<String>>,
}

/// Load weights from a PyTorch pickle (`.pth`/`.pt`/anything else) or a
/// `.safetensors` file.
pub fn load(path: &Path, device: &Device) -> Result<Checkpoint> {
    let is_safetensors = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("safetensors"));

    let checkpoint = if is_safetensors {
        let tensors = candle_core::safetensors::load(path, device)
            .with_context(|| format!("failed to read safetensors {}", path.display()))?;
        unwrap_flattened(tensors)
    } else {
        load_pickle(path)?
    };

    if checkpoint.tensors.is_empty() {
        bail!("checkpoint {} contains no tensors", path.display());
    }

    log::info!(
        "Checkpoint {}: {} tensors, {}",
        path.display(),
        checkpoint.tensors.len(),
        checkpoint.layout
    );
    Ok(checkpoint)
}

fn load_pickle(path: &Path) -> Result<Checkpoint> {
    let classes = match read_pickle_classes(path) {
        Ok(classes) => classes,
        Err(e) => {
            log::debug!("no class list readable from {}: {:#}", path.display(), e);
            None
        }
    };

    for key in WRAPPER_KEYS {
        match candle_core::pickle::read_all_with_key(path, Some(key)) {
            Ok(tensors) if !tensors.is_empty() => {
                return Ok(Checkpoint {
                    layout: CheckpointLayout::Wrapped(key),
                    tensors: tensors.into_iter().collect(),
                    classes,
                });
            }
            Ok(_) => log::debug!("'{}' in {} holds no tensors", key, path.display()),
            Err(e) => log::debug!("no '{}' in {}: {}", key, path.display(), e),
        }
    }

    let tensors = candle_core::pickle::read_all_with_key(path, None)
        .with_context(|| format!("failed to read checkpoint {}", path.display()))?;

    Ok(Checkpoint {
        layout: CheckpointLayout::Raw,
        tensors: tensors.into_iter().collect(),
        classes,
    })
}

/// Unpickle the `data.pkl` record of a PyTorch zip checkpoint and pull out
/// its class list. Tensor storages stay unresolved, only the object tree is
/// read.
fn read_pickle_classes(path: &Path) -> Result<Option<Vec<String>>> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(path)?))?;
    let Some(name) = archive
        .file_names()
        .find(|name| name.ends_with("data.pkl"))
        .map(str::to_owned)
    else {
        return Ok(None);
    };

    let mut reader = BufReader::new(archive.by_name(&name)?);
    let mut stack = Stack::empty();
    stack.read_loop(&mut reader)?;
    Ok(class_names(stack.finalize()?))
}

/// `classes` entry of a top-level dict, if it is a list of strings.
fn class_names(root: Object) -> Option<Vec<String>> {
    let Object::Dict(entries) = root else {
        return None;
    };
    let value = entries
        .into_iter()
        .find(|(key, _)| *key == Object::Unicode(CLASSES_KEY.to_string()))
        .map(|(_, value)| value)?;

    let items = match value {
        Object::List(items) | Object::Tuple(items) => items,
        _ => return None,
    };
    items.into_iter().map(|item| item.unicode().ok()).collect()
}

/// Safetensors files are flat, so a container shows up as a shared name
/// prefix (`model_state_dict.conv1.weight`). Keep only the weights under the
/// first wrapper key present and strip the prefix.
fn unwrap_flattened(tensors: HashMap<String, Tensor>) -> Checkpoint {
    for key in WRAPPER_KEYS {
        let prefix = format!("{}.", key);
        if !tensors.keys().any(|name| name.starts_with(&prefix)) {
            continue;
        }

        let unwrapped = tensors
            .into_iter()
            .filter_map(|(name, tensor)| {
                name.strip_prefix(&prefix)
                    .map(|inner| (inner.to_string(), tensor))
            })
            .collect();

        return Checkpoint {
            layout: CheckpointLayout::Wrapped(key),
            tensors: unwrapped,
            classes: None,
        };
    }

    Checkpoint {
        layout: CheckpointLayout::Raw,
        tensors,
        classes: None,
    }
}
