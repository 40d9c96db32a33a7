// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::binding::{ChannelSlot, ResourceKind};
use crate::renderer::api::technique::ShaderStage;
use std::fmt;

/// A failure to compile or link a technique.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderError {
    /// A stage failed to parse or validate.
    Compilation {
        /// Technique label.
        label: String,
        /// Stage that failed.
        stage: ShaderStage,
        /// Compiler diagnostics.
        diagnostics: String,
    },
    /// All stages compiled but the program could not be linked.
    Link {
        /// Technique label.
        label: String,
        /// What failed to link.
        details: String,
    },
    /// A stage's entry point does not exist or has the wrong stage kind.
    MissingEntryPoint {
        /// Technique label.
        label: String,
        /// Stage whose entry point is missing.
        stage: ShaderStage,
        /// Entry point name that was looked up.
        entry_point: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Compilation {
                label,
                stage,
                diagnostics,
            } => {
                write!(
                    f,
                    "Shader compilation failed for '{label}' ({stage} stage): {diagnostics}"
                )
            }
            ShaderError::Link { label, details } => {
                write!(f, "Technique link failed for '{label}': {details}")
            }
            ShaderError::MissingEntryPoint {
                label,
                stage,
                entry_point,
            } => {
                write!(
                    f,
                    "Technique '{label}' has no {stage} entry point named '{entry_point}'"
                )
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The allocation exceeds what the device can provide.
    OutOfMemory {
        /// Requested size in bytes.
        requested: u64,
        /// Device limit in bytes.
        limit: u64,
    },
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
    /// The operation does not support the resource's format.
    UnsupportedFormat(String),
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::OutOfMemory { requested, limit } => {
                write!(
                    f,
                    "Out of device memory: requested {requested} bytes, limit is {limit} bytes."
                )
            }
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {msg}"),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// A failure to connect a technique's resources to channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// The linked program does not reference the name.
    ResourceNotFound {
        /// Technique label.
        technique: String,
        /// Name that was looked up.
        name: String,
    },
    /// The name exists but as a different resource class.
    KindMismatch {
        /// Technique label.
        technique: String,
        /// Name that was looked up.
        name: String,
        /// Class the caller asked for.
        expected: ResourceKind,
        /// Class actually found.
        found: ResourceKind,
    },
    /// The builder was sealed with resources still lacking a channel.
    Unassigned {
        /// Technique label.
        technique: String,
        /// Resources without a channel.
        names: Vec<String>,
    },
    /// A draw or dispatch found nothing in a channel the technique reads.
    EmptyChannel {
        /// Technique label.
        technique: String,
        /// Resource resolved through the channel.
        name: String,
        /// The empty slot.
        slot: ChannelSlot,
    },
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingError::ResourceNotFound { technique, name } => {
                write!(f, "Technique '{technique}' does not reference '{name}'")
            }
            BindingError::KindMismatch {
                technique,
                name,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Technique '{technique}': '{name}' is a {found}, expected a {expected}"
                )
            }
            BindingError::Unassigned { technique, names } => {
                write!(
                    f,
                    "Technique '{technique}' has unassigned resources: {}",
                    names.join(", ")
                )
            }
            BindingError::EmptyChannel {
                technique,
                name,
                slot,
            } => {
                write!(
                    f,
                    "Technique '{technique}': nothing bound to {slot} for '{name}'"
                )
            }
        }
    }
}

impl std::error::Error for BindingError {}

/// A high-level error raised while recording or executing GPU work.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A technique failed to compile or link.
    Shader(ShaderError),
    /// A resource operation failed.
    Resource(ResourceError),
    /// A technique's resources could not be resolved.
    Binding(BindingError),
    /// The command list was malformed or rejected by the backend.
    Submission(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Shader(err) => write!(f, "Shader error: {err}"),
            RenderError::Resource(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::Binding(err) => write!(f, "Binding error: {err}"),
            RenderError::Submission(msg) => write!(f, "Command submission failed: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Shader(err) => Some(err),
            RenderError::Resource(err) => Some(err),
            RenderError::Binding(err) => Some(err),
            RenderError::Submission(_) => None,
        }
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::Shader(err)
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}

impl From<BindingError> for RenderError {
    fn from(err: BindingError) -> Self {
        RenderError::Binding(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::Compilation {
            label: "list_build".to_string(),
            stage: ShaderStage::Fragment,
            diagnostics: "expected ';'".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Shader compilation failed for 'list_build' (fragment stage): expected ';'"
        );

        let link = ShaderError::Link {
            label: "resolve".to_string(),
            details: "'heads' is missing".to_string(),
        };
        assert_eq!(
            format!("{link}"),
            "Technique link failed for 'resolve': 'heads' is missing"
        );
    }

    #[test]
    fn binding_error_display() {
        let err = BindingError::EmptyChannel {
            technique: "cone_trace".to_string(),
            name: "volume".to_string(),
            slot: ChannelSlot::new(ResourceKind::SampledTexture, 0),
        };
        assert_eq!(
            format!("{err}"),
            "Technique 'cone_trace': nothing bound to sampled texture channel 0 for 'volume'"
        );

        let unassigned = BindingError::Unassigned {
            technique: "resolve".to_string(),
            names: vec!["heads".to_string(), "nodes".to_string()],
        };
        assert_eq!(
            format!("{unassigned}"),
            "Technique 'resolve' has unassigned resources: heads, nodes"
        );
    }

    #[test]
    fn render_error_display_wrapping_resource_error() {
        let res_err = ResourceError::OutOfMemory {
            requested: 1024,
            limit: 512,
        };
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Out of device memory: requested 1024 bytes, limit is 512 bytes."
        );
        assert!(render_err.source().is_some());
    }
}
