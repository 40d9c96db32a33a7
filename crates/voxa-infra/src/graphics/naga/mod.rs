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

//! WGSL front end shared by every backend.
//!
//! [`link_technique`] parses and validates each stage with naga, checks that
//! the stages agree with each other and with the technique's declared
//! interface, and collects the resources the entry points actually use.
//! Backends then expose the result to the renderer through
//! [`LinkedInterface`] and their own [`NameConvention`].

mod interface;
pub(crate) mod types;

pub use self::interface::{LinkedInterface, NameConvention};

use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};
use naga::{
    AddressSpace, Binding, GlobalVariable, Handle, ImageClass, Module, ResourceBinding, Type,
    TypeInner,
};
use std::borrow::Cow;
use std::sync::Arc;
use voxa_core::renderer::api::{ResourceKind, ShaderStage, StageSource, TechniqueDescriptor};
use voxa_core::renderer::reflection::{
    ElementType, EntryPointInfo, RawMemberRecord, RawResourceRecord, RawVertexInput,
    ReflectionTable,
};
use voxa_core::renderer::ShaderError;

/// One stage of a linked program.
#[derive(Debug, Clone)]
pub struct LinkedStage {
    pub stage: ShaderStage,
    pub entry_point: String,
    /// Index of the entry point in `module.entry_points`.
    pub entry_index: usize,
    pub source: Cow<'static, str>,
    pub module: Arc<Module>,
    pub info: Arc<ModuleInfo>,
}

/// A resource used by at least one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedResource {
    pub name: String,
    pub record: RawResourceRecord,
    pub members: Vec<(String, RawMemberRecord)>,
}

/// The validated, cross-checked form of a [`TechniqueDescriptor`].
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    pub label: String,
    pub stages: Vec<LinkedStage>,
    /// Sorted by `(group, binding)`.
    pub resources: Vec<LinkedResource>,
    pub vertex_inputs: Vec<(String, RawVertexInput)>,
    pub entry_points: Vec<EntryPointInfo>,
}

impl LinkedProgram {
    pub fn stage(&self, stage: ShaderStage) -> Option<&LinkedStage> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Builds the renderer-facing reflection table.
    pub fn reflection(&self, convention: NameConvention) -> ReflectionTable {
        ReflectionTable::from_interface(&LinkedInterface::new(self, convention))
    }

    /// Workgroup size of the compute entry point, `[1, 1, 1]` otherwise.
    pub fn workgroup_size(&self) -> [u32; 3] {
        self.entry_points
            .iter()
            .find(|e| e.stage == ShaderStage::Compute)
            .map_or([1, 1, 1], |e| e.workgroup_size)
    }
}

struct ParsedSource {
    source: Cow<'static, str>,
    module: Arc<Module>,
    info: Arc<ModuleInfo>,
}

fn link_error(label: &str, details: impl Into<String>) -> ShaderError {
    ShaderError::Link {
        label: label.to_owned(),
        details: details.into(),
    }
}

const fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
        ShaderStage::Compute => naga::ShaderStage::Compute,
    }
}

fn check_stage_combination(descriptor: &TechniqueDescriptor) -> Result<(), ShaderError> {
    let count = |stage| descriptor.stages.iter().filter(|s| s.stage == stage).count();
    let (vertex, fragment, compute) = (
        count(ShaderStage::Vertex),
        count(ShaderStage::Fragment),
        count(ShaderStage::Compute),
    );
    match (vertex, fragment, compute) {
        (0, 0, 1) | (1, 1, 0) => Ok(()),
        _ => Err(link_error(
            &descriptor.label,
            format!(
                "expected one compute stage or a vertex and fragment pair, \
                 got {vertex} vertex, {fragment} fragment, {compute} compute"
            ),
        )),
    }
}

fn parse_source(label: &str, stage: &StageSource) -> Result<ParsedSource, ShaderError> {
    let compilation = |diagnostics: String| ShaderError::Compilation {
        label: label.to_owned(),
        stage: stage.stage,
        diagnostics,
    };
    let module = naga::front::wgsl::parse_str(&stage.source)
        .map_err(|e| compilation(e.emit_to_string(&stage.source)))?;
    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| compilation(e.emit_to_string(&stage.source)))?;
    Ok(ParsedSource {
        source: stage.source.clone(),
        module: Arc::new(module),
        info: Arc::new(info),
    })
}

/// A value crossing a stage boundary or entering the vertex stage.
struct LocatedValue {
    name: String,
    location: u32,
    element: ElementType,
}

fn collect_located(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<LocatedValue>,
) -> Result<(), String> {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(LocatedValue {
            name: name.unwrap_or_default().to_owned(),
            location: *location,
            element: types::element_type(module, ty)?,
        }),
        Some(_) => {}
        None => {
            if let TypeInner::Struct { ref members, .. } = module.types[ty].inner {
                for member in members {
                    collect_located(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn stage_inputs(stage: &LinkedStage) -> Result<Vec<LocatedValue>, String> {
    let function = &stage.module.entry_points[stage.entry_index].function;
    let mut values = Vec::new();
    for argument in &function.arguments {
        collect_located(
            &stage.module,
            argument.name.as_deref(),
            argument.ty,
            argument.binding.as_ref(),
            &mut values,
        )?;
    }
    Ok(values)
}

fn stage_outputs(stage: &LinkedStage) -> Result<Vec<LocatedValue>, String> {
    let function = &stage.module.entry_points[stage.entry_index].function;
    let mut values = Vec::new();
    if let Some(result) = &function.result {
        collect_located(
            &stage.module,
            None,
            result.ty,
            result.binding.as_ref(),
            &mut values,
        )?;
    }
    Ok(values)
}

fn reflect_global(
    descriptor: &TechniqueDescriptor,
    module: &Module,
    name: &str,
    variable: &GlobalVariable,
    binding: &ResourceBinding,
    stage: ShaderStage,
) -> Result<LinkedResource, String> {
    let inner = &module.types[variable.ty].inner;
    let declared_counter = descriptor
        .declaration(name)
        .is_some_and(|d| d.kind == ResourceKind::AtomicCounter);

    let kind = match variable.space {
        AddressSpace::Uniform => ResourceKind::UniformBuffer,
        AddressSpace::Storage { .. } if declared_counter => ResourceKind::AtomicCounter,
        AddressSpace::Storage { .. } => ResourceKind::StorageBuffer,
        AddressSpace::Handle => match inner {
            TypeInner::Image {
                class: ImageClass::Storage { .. },
                ..
            } => ResourceKind::StorageImage,
            TypeInner::Image { .. } => ResourceKind::SampledTexture,
            TypeInner::Sampler { .. } => ResourceKind::Sampler,
            other => return Err(format!("'{name}' has unsupported handle type {other:?}")),
        },
        other => return Err(format!("'{name}' lives in unsupported address space {other:?}")),
    };

    let writable = match (variable.space, inner) {
        (AddressSpace::Storage { access }, _) => access.contains(naga::StorageAccess::STORE),
        (
            _,
            TypeInner::Image {
                class: ImageClass::Storage { access, .. },
                ..
            },
        ) => access.contains(naga::StorageAccess::STORE),
        _ => false,
    };

    let mut members = Vec::new();
    if let TypeInner::Struct {
        members: ref struct_members,
        ..
    } = *inner
    {
        for member in struct_members {
            members.push((
                member.name.clone().unwrap_or_default(),
                RawMemberRecord {
                    offset: member.offset as u64,
                    element: types::element_type(module, member.ty)?,
                },
            ));
        }
    }

    Ok(LinkedResource {
        name: name.to_owned(),
        record: RawResourceRecord {
            kind,
            group: binding.group,
            binding: binding.binding,
            element: types::element_type(module, variable.ty)
                .map_err(|e| format!("'{name}': {e}"))?,
            stages: stage.as_flag(),
            writable,
        },
        members,
    })
}

fn merge_resource(
    resources: &mut Vec<LinkedResource>,
    resource: LinkedResource,
) -> Result<(), String> {
    if let Some(existing) = resources.iter_mut().find(|r| r.name == resource.name) {
        let (a, b) = (&existing.record, &resource.record);
        if a.group != b.group || a.binding != b.binding || a.element != b.element {
            return Err(format!(
                "'{}' is declared differently across stages",
                resource.name
            ));
        }
        existing.record.stages.insert(b.stages);
        existing.record.writable |= b.writable;
        return Ok(());
    }
    if let Some(clash) = resources.iter().find(|r| {
        r.record.group == resource.record.group && r.record.binding == resource.record.binding
    }) {
        return Err(format!(
            "'{}' and '{}' share @group({}) @binding({})",
            clash.name, resource.name, resource.record.group, resource.record.binding
        ));
    }
    resources.push(resource);
    Ok(())
}

/// Parses, validates and links every stage of `descriptor`.
pub fn link_technique(descriptor: &TechniqueDescriptor) -> Result<LinkedProgram, ShaderError> {
    let label = descriptor.label.as_str();
    check_stage_combination(descriptor)?;

    let mut parsed: Vec<ParsedSource> = Vec::new();
    let mut stages = Vec::with_capacity(descriptor.stages.len());
    for stage in &descriptor.stages {
        let position = match parsed.iter().position(|p| p.source == stage.source) {
            Some(position) => position,
            None => {
                parsed.push(parse_source(label, stage)?);
                parsed.len() - 1
            }
        };
        let source = &parsed[position];
        let entry_index = source
            .module
            .entry_points
            .iter()
            .position(|e| e.name == stage.entry_point && e.stage == naga_stage(stage.stage))
            .ok_or_else(|| ShaderError::MissingEntryPoint {
                label: label.to_owned(),
                stage: stage.stage,
                entry_point: stage.entry_point.to_string(),
            })?;
        stages.push(LinkedStage {
            stage: stage.stage,
            entry_point: stage.entry_point.to_string(),
            entry_index,
            source: source.source.clone(),
            module: Arc::clone(&source.module),
            info: Arc::clone(&source.info),
        });
    }

    let mut resources = Vec::new();
    for stage in &stages {
        let usage = stage.info.get_entry_point(stage.entry_index);
        for (handle, variable) in stage.module.global_variables.iter() {
            let Some(binding) = &variable.binding else {
                continue;
            };
            if usage[handle].is_empty() {
                continue;
            }
            let name = variable.name.clone().unwrap_or_else(|| {
                format!("binding_{}_{}", binding.group, binding.binding)
            });
            let resource =
                reflect_global(descriptor, &stage.module, &name, variable, binding, stage.stage)
                    .map_err(|e| link_error(label, e))?;
            merge_resource(&mut resources, resource).map_err(|e| link_error(label, e))?;
        }
    }
    resources.sort_by_key(|r| (r.record.group, r.record.binding));

    let mut vertex_inputs = Vec::new();
    if let Some(vertex) = stages.iter().find(|s| s.stage == ShaderStage::Vertex) {
        let inputs = stage_inputs(vertex).map_err(|e| link_error(label, e))?;
        for input in &inputs {
            let covered = descriptor.vertex_layout.as_ref().is_some_and(|layout| {
                layout
                    .attributes
                    .iter()
                    .any(|a| a.shader_location == input.location)
            });
            if !covered {
                return Err(link_error(
                    label,
                    format!(
                        "vertex input '{}' at location {} has no vertex attribute",
                        input.name, input.location
                    ),
                ));
            }
        }
        if let Some(fragment) = stages.iter().find(|s| s.stage == ShaderStage::Fragment) {
            let outputs = stage_outputs(vertex).map_err(|e| link_error(label, e))?;
            for input in stage_inputs(fragment).map_err(|e| link_error(label, e))? {
                match outputs.iter().find(|o| o.location == input.location) {
                    Some(output) if output.element == input.element => {}
                    Some(output) => {
                        return Err(link_error(
                            label,
                            format!(
                                "location {} is {:?} in the vertex stage but {:?} in the fragment stage",
                                input.location, output.element, input.element
                            ),
                        ))
                    }
                    None => {
                        return Err(link_error(
                            label,
                            format!(
                                "fragment input '{}' at location {} is not written by the vertex stage",
                                input.name, input.location
                            ),
                        ))
                    }
                }
            }
        }
        vertex_inputs = inputs
            .into_iter()
            .map(|v| {
                (
                    v.name,
                    RawVertexInput {
                        location: v.location,
                        element: v.element,
                    },
                )
            })
            .collect();
    }

    for declaration in &descriptor.interface {
        match resources.iter().find(|r| r.name == declaration.name) {
            Some(r) if r.record.kind != declaration.kind => {
                return Err(link_error(
                    label,
                    format!(
                        "'{}' is a {} but is declared as a {}",
                        declaration.name, r.record.kind, declaration.kind
                    ),
                ))
            }
            Some(_) => {}
            None if declaration.optional => {}
            None => {
                return Err(link_error(
                    label,
                    format!("'{}' is not used by any stage", declaration.name),
                ))
            }
        }
    }

    let entry_points = stages
        .iter()
        .map(|s| EntryPointInfo {
            stage: s.stage,
            name: s.entry_point.clone(),
            workgroup_size: match s.stage {
                ShaderStage::Compute => s.module.entry_points[s.entry_index].workgroup_size,
                _ => [1, 1, 1],
            },
        })
        .collect();

    log::debug!(
        "Linked technique '{label}': {} stage(s), {} resource(s)",
        stages.len(),
        resources.len()
    );

    Ok(LinkedProgram {
        label: label.to_owned(),
        stages,
        resources,
        vertex_inputs,
        entry_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxa_core::renderer::api::{
        RasterState, ResourceDeclaration, ShaderStages, VertexAttribute, VertexFormat,
        VertexLayout,
    };
    use voxa_core::renderer::reflection::InterfaceItem;
    use voxa_core::renderer::reflection::ProgramInterface;

    const COUNTER_SHADER: &str = "
        @group(0) @binding(0) var<storage, read_write> counter: array<atomic<u32>>;
        @group(0) @binding(1) var<storage, read_write> nodes: array<vec4<u32>>;
        @group(0) @binding(2) var<storage, read> unused: array<u32>;

        @compute @workgroup_size(8, 8, 1)
        fn main(@builtin(global_invocation_id) id: vec3<u32>) {
            let slot = atomicAdd(&counter[0], 1u);
            nodes[slot] = vec4<u32>(id, 0u);
        }
    ";

    const RASTER_SHADER: &str = "
        struct Axis { view_proj: mat4x4<f32>, resolution: u32 }
        @group(0) @binding(0) var<uniform> axis: Axis;

        struct VertexOut {
            @builtin(position) clip: vec4<f32>,
            @location(0) world: vec3<f32>,
        }

        @vertex
        fn vs_main(@location(0) position: vec3<f32>) -> VertexOut {
            var out: VertexOut;
            out.clip = axis.view_proj * vec4<f32>(position, 1.0);
            out.world = position;
            return out;
        }

        @fragment
        fn fs_main(@location(0) world: vec3<f32>) -> @location(0) vec4<f32> {
            return vec4<f32>(world, 1.0);
        }

        @fragment
        fn fs_bad(@location(0) world: vec4<f32>) -> @location(0) vec4<f32> {
            return world;
        }
    ";

    fn compute(source: &'static str, interface: Vec<ResourceDeclaration>) -> TechniqueDescriptor {
        TechniqueDescriptor {
            label: "test".into(),
            stages: vec![StageSource::new(ShaderStage::Compute, "main", source)],
            interface,
            raster: RasterState::default(),
            vertex_layout: None,
            color_format: None,
            host_kernel: None,
        }
    }

    fn raster(fragment: &'static str, layout: Option<VertexLayout>) -> TechniqueDescriptor {
        TechniqueDescriptor {
            label: "raster".into(),
            stages: vec![
                StageSource::new(ShaderStage::Vertex, "vs_main", RASTER_SHADER),
                StageSource::new(ShaderStage::Fragment, fragment, RASTER_SHADER),
            ],
            interface: vec![ResourceDeclaration::required(
                "axis",
                ResourceKind::UniformBuffer,
            )],
            raster: RasterState::default(),
            vertex_layout: layout,
            color_format: None,
            host_kernel: None,
        }
    }

    fn position_layout() -> Option<VertexLayout> {
        Some(VertexLayout {
            array_stride: 12,
            attributes: vec![VertexAttribute {
                shader_location: 0,
                format: VertexFormat::Float32x3,
                offset: 0,
            }],
        })
    }

    #[test]
    fn test_only_used_resources_are_reflected() {
        let program = link_technique(&compute(
            COUNTER_SHADER,
            vec![ResourceDeclaration::required(
                "counter",
                ResourceKind::AtomicCounter,
            )],
        ))
        .unwrap();
        let names: Vec<_> = program.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["counter", "nodes"]);
        assert_eq!(program.resources[0].record.kind, ResourceKind::AtomicCounter);
        assert_eq!(program.resources[1].record.kind, ResourceKind::StorageBuffer);
        assert!(program.resources[1].record.writable);
        assert_eq!(program.workgroup_size(), [8, 8, 1]);
    }

    #[test]
    fn test_syntax_errors_are_compilation_errors() {
        let err = link_technique(&compute("fn main( {", Vec::new())).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compilation {
                stage: ShaderStage::Compute,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_entry_point() {
        let mut descriptor = compute(COUNTER_SHADER, Vec::new());
        descriptor.stages[0].entry_point = Cow::Borrowed("not_there");
        assert!(matches!(
            link_technique(&descriptor),
            Err(ShaderError::MissingEntryPoint { .. })
        ));
    }

    #[test]
    fn test_required_declaration_must_be_used() {
        let err = link_technique(&compute(
            COUNTER_SHADER,
            vec![ResourceDeclaration::required(
                "unused",
                ResourceKind::StorageBuffer,
            )],
        ))
        .unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }), "{err}");

        link_technique(&compute(
            COUNTER_SHADER,
            vec![ResourceDeclaration::optional(
                "unused",
                ResourceKind::StorageBuffer,
            )],
        ))
        .unwrap();
    }

    #[test]
    fn test_raster_stages_share_one_module_and_members() {
        let program = link_technique(&raster("fs_main", position_layout())).unwrap();
        assert!(Arc::ptr_eq(&program.stages[0].module, &program.stages[1].module));
        let axis = &program.resources[0];
        assert_eq!(axis.record.stages, ShaderStages::VERTEX);
        let members: Vec<_> = axis.members.iter().map(|(n, m)| (n.as_str(), m.offset)).collect();
        assert_eq!(members, [("view_proj", 0), ("resolution", 64)]);
        assert_eq!(program.vertex_inputs.len(), 1);
    }

    #[test]
    fn test_varying_type_mismatch_fails_to_link() {
        let err = link_technique(&raster("fs_bad", position_layout())).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }), "{err}");
    }

    #[test]
    fn test_vertex_inputs_need_a_layout() {
        let err = link_technique(&raster("fs_main", None)).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }), "{err}");
    }

    #[test]
    fn test_name_conventions_feed_the_same_table() {
        let program = link_technique(&raster("fs_main", position_layout())).unwrap();
        let with = LinkedInterface::new(&program, NameConvention::IncludesTerminator);
        let without = LinkedInterface::new(&program, NameConvention::ExcludesTerminator);
        assert_eq!(with.name_length(InterfaceItem::Resource(0)), 5);
        assert_eq!(without.name_length(InterfaceItem::Resource(0)), 4);
        assert_eq!(
            program.reflection(NameConvention::IncludesTerminator),
            program.reflection(NameConvention::ExcludesTerminator)
        );
        let table = program.reflection(NameConvention::ExcludesTerminator);
        let layout = table
            .layout_of("axis.resolution", ResourceKind::UniformBuffer)
            .unwrap();
        assert_eq!(layout.offset, 64);
    }

    #[test]
    fn test_stage_combinations() {
        let mut descriptor = raster("fs_main", position_layout());
        descriptor.stages.pop();
        assert!(matches!(
            link_technique(&descriptor),
            Err(ShaderError::Link { .. })
        ));
    }
}
