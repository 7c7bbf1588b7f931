use anyhow::Result;
use std::path::Path;
use wgpu::util::DeviceExt;

pub mod texture {
    use super::*;
    use image::GenericImageView;

    /// Upload raw RGBA8 pixels as a nearest-filtered texture.
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &[u8],
        width: u32,
        height: u32,
        label: &str,
    ) -> (wgpu::Texture, wgpu::TextureView, wgpu::Sampler) {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            rgba,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        (texture, view, sampler)
    }

    /// Decode an encoded image (png, jpeg, ...) and upload it.
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
    ) -> Result<(wgpu::Texture, wgpu::TextureView, wgpu::Sampler)> {
        let img = image::load_from_memory(bytes)?;
        let rgba = img.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(from_rgba(device, queue, &rgba, width, height, label))
    }

    /// 1x1 white texture, the stand-in wherever a real one is missing.
    pub fn white(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> (wgpu::TextureView, wgpu::Sampler) {
        let (_texture, view, sampler) =
            from_rgba(device, queue, &[255, 255, 255, 255], 1, 1, "white_texture");
        (view, sampler)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
}

impl InstanceRaw {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBS: [wgpu::VertexAttribute; 4] =
            wgpu::vertex_attr_array![5 => Float32x4, 6 => Float32x4, 7 => Float32x4, 8 => Float32x4];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBS,
        }
    }
}

pub struct Material {
    pub name: String,
    pub bind_group: wgpu::BindGroup,
}

pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
    pub material_index: usize,
}

pub struct Model {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
}

pub trait Drawable<'a> {
    fn draw_model(&mut self, model: &'a Model, instance_buffer: &'a wgpu::Buffer, instances: u32);
}

impl<'a, 'b> Drawable<'a> for wgpu::RenderPass<'b>
where
    'a: 'b,
{
    fn draw_model(&mut self, model: &'a Model, instance_buffer: &'a wgpu::Buffer, instances: u32) {
        self.set_vertex_buffer(1, instance_buffer.slice(..));
        for mesh in &model.meshes {
            let material = &model.materials[mesh.material_index];
            self.set_bind_group(1, &material.bind_group, &[]);
            self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            self.draw_indexed(0..mesh.num_indices, 0, 0..instances);
        }
    }
}

/// Layout for material bind groups (group 1 in both shaders' fragment
/// stage): diffuse texture + sampler. The renderer creates the same layout
/// for its pipeline.
pub fn texture_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("texture_bind_group_layout"),
    })
}

fn material_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some(label),
    })
}

/// glTF images arrive already decoded; normalize to RGBA8 for upload.
fn gltf_image_rgba(image: &gltf::image::Data) -> Option<Vec<u8>> {
    use gltf::image::Format;
    match image.format {
        Format::R8G8B8A8 => Some(image.pixels.clone()),
        Format::R8G8B8 => Some(
            image
                .pixels
                .chunks_exact(3)
                .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                .collect(),
        ),
        _ => None,
    }
}

pub fn load_gltf<P: AsRef<Path>>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    path: P,
) -> Result<Model> {
    let (doc, buffers, images) = gltf::import(path.as_ref())?;

    let (fallback_view, fallback_sampler) = texture::white(device, queue);

    let mut materials = Vec::new();
    for material in doc.materials() {
        let pbr = material.pbr_metallic_roughness();

        let (view, sampler) = match pbr
            .base_color_texture()
            .map(|info| &images[info.texture().source().index()])
            .and_then(|image| gltf_image_rgba(image).map(|rgba| (image, rgba)))
        {
            Some((image, rgba)) => {
                let (_texture, view, sampler) = texture::from_rgba(
                    device,
                    queue,
                    &rgba,
                    image.width,
                    image.height,
                    "gltf_texture",
                );
                (view, sampler)
            }
            None => (fallback_view.clone(), fallback_sampler.clone()),
        };

        materials.push(Material {
            name: material.name().unwrap_or_default().to_string(),
            bind_group: material_bind_group(device, layout, &view, &sampler, "material_bind_group"),
        });
    }

    if materials.is_empty() {
        materials.push(Material {
            name: "fallback_material".to_string(),
            bind_group: material_bind_group(
                device,
                layout,
                &fallback_view,
                &fallback_sampler,
                "fallback_material_bind_group",
            ),
        });
    }

    let mut meshes = Vec::new();
    for scene in doc.scenes() {
        for node in scene.nodes() {
            let Some(mesh) = node.mesh() else { continue };
            for primitive in mesh.primitives() {
                let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

                let Some(positions) = reader.read_positions() else { continue };
                let positions: Vec<[f32; 3]> = positions.collect();
                let normals: Vec<[f32; 3]> = match reader.read_normals() {
                    Some(normals) => normals.collect(),
                    None => vec![[0.0, 1.0, 0.0]; positions.len()],
                };
                let tex_coords: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                    Some(coords) => coords.into_f32().collect(),
                    None => vec![[0.0, 0.0]; positions.len()],
                };

                let vertices: Vec<Vertex> = positions
                    .iter()
                    .zip(normals.iter())
                    .zip(tex_coords.iter())
                    .map(|((pos, norm), tc)| Vertex {
                        position: *pos,
                        tex_coords: *tc,
                        normal: *norm,
                    })
                    .collect();

                let indices: Vec<u32> = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..vertices.len() as u32).collect(),
                };

                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("GLTF Vertex Buffer"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("GLTF Index Buffer"),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                });

                meshes.push(Mesh {
                    name: mesh.name().unwrap_or_default().to_string(),
                    vertex_buffer,
                    index_buffer,
                    num_indices: indices.len() as u32,
                    material_index: primitive.material().index().unwrap_or(0),
                });
            }
        }
    }

    Ok(Model { meshes, materials })
}

/// CPU-side placeholder character: a box the size of a person, origin at the
/// feet so terrain clamping puts it on the ground.
pub fn placeholder_geometry() -> (Vec<Vertex>, Vec<u32>) {
    const W: f32 = 0.3;
    const H: f32 = 1.7;
    const D: f32 = 0.175;

    // per-face normals and counter-clockwise corners, seen from outside
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([1.0, 0.0, 0.0], [[W, 0.0, D], [W, 0.0, -D], [W, H, -D], [W, H, D]]),
        ([-1.0, 0.0, 0.0], [[-W, 0.0, -D], [-W, 0.0, D], [-W, H, D], [-W, H, -D]]),
        ([0.0, 1.0, 0.0], [[-W, H, D], [W, H, D], [W, H, -D], [-W, H, -D]]),
        ([0.0, -1.0, 0.0], [[-W, 0.0, -D], [W, 0.0, -D], [W, 0.0, D], [-W, 0.0, D]]),
        ([0.0, 0.0, 1.0], [[-W, 0.0, D], [W, 0.0, D], [W, H, D], [-W, H, D]]),
        ([0.0, 0.0, -1.0], [[W, 0.0, -D], [-W, 0.0, -D], [-W, H, -D], [W, H, -D]]),
    ];
    const UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, corners) in faces {
        let base = vertices.len() as u32;
        for (corner, uv) in corners.iter().zip(UVS.iter()) {
            vertices.push(Vertex {
                position: *corner,
                tex_coords: *uv,
                normal,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

fn placeholder(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    diffuse_png: Option<&[u8]>,
) -> Model {
    let (view, sampler) = match diffuse_png
        .map(|bytes| texture::from_bytes(device, queue, bytes, "character_diffuse"))
    {
        Some(Ok((_texture, view, sampler))) => (view, sampler),
        Some(Err(e)) => {
            log::warn!("character diffuse failed to decode: {e:?}");
            texture::white(device, queue)
        }
        None => texture::white(device, queue),
    };

    let (vertices, indices) = placeholder_geometry();
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Placeholder Vertex Buffer"),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Placeholder Index Buffer"),
        contents: bytemuck::cast_slice(&indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    Model {
        meshes: vec![Mesh {
            name: "placeholder".to_string(),
            vertex_buffer,
            index_buffer,
            num_indices: indices.len() as u32,
            material_index: 0,
        }],
        materials: vec![Material {
            name: "placeholder_material".to_string(),
            bind_group: material_bind_group(
                device,
                layout,
                &view,
                &sampler,
                "placeholder_material_bind_group",
            ),
        }],
    }
}

/// Load the character model, degrading to the placeholder when the asset is
/// missing or empty so a bare checkout still runs.
pub fn load_character(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    path: &str,
) -> Model {
    match load_gltf(device, queue, layout, path) {
        Ok(model) if !model.meshes.is_empty() => {
            log::info!("loaded character model from {path}");
            model
        }
        Ok(_) => {
            log::warn!("{path} contains no meshes, using placeholder character");
            placeholder(device, queue, layout, None)
        }
        Err(e) => {
            log::warn!("could not load {path} ({e}), using placeholder character");
            let diffuse = std::fs::read("res/character.png").ok();
            placeholder(device, queue, layout, diffuse.as_deref())
        }
    }
}
