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

use crate::renderer::api::technique::{TechniqueDescriptor, UnboundTechnique};
use crate::renderer::error::ShaderError;

/// Compiles and links techniques for one backend.
pub trait TechniqueCompiler {
    /// Compiles every stage, links them and reflects the program interface.
    ///
    /// ## Errors
    /// * `ShaderError::Compilation` - A stage failed to parse or validate.
    /// * `ShaderError::MissingEntryPoint` - A stage's entry point is absent.
    /// * `ShaderError::Link` - Stages disagree, or a required declared resource is missing.
    fn compile(&self, descriptor: &TechniqueDescriptor) -> Result<UnboundTechnique, ShaderError>;
}
