use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::camera::{FollowCamera, Projection};
use crate::camera_controller::CameraController;
use crate::chunk::{ChunkCoord, LineVertex};
use crate::model::{self, Drawable, InstanceRaw, Model, Vertex};
use crate::player::{Player, PlayerController};
use crate::streaming::{ChunkScene, TerrainStreamer};
use crate::world::HeightField;

const CHARACTER_MODEL_PATH: &str = "res/character.glb";

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    fn new() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
        }
    }

    fn update_view_proj(&mut self, camera: &FollowCamera, projection: &Projection) {
        self.view_proj =
            (projection.build_projection_matrix() * camera.build_view_matrix()).to_cols_array_2d();
    }
}

/// GPU half of one resident chunk: vertex data plus its single-instance
/// translation to the chunk origin. Dropped on eviction, which releases the
/// buffers.
struct ChunkRenderData {
    vertex_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    num_vertices: u32,
}

/// Display collaborator handed to the streamer each tick. Borrows the device
/// and the chunk map so the streamer itself never touches wgpu.
struct ChunkUploader<'a> {
    device: &'a wgpu::Device,
    chunks: &'a mut HashMap<ChunkCoord, ChunkRenderData>,
}

impl ChunkScene for ChunkUploader<'_> {
    fn add_chunk(&mut self, coord: ChunkCoord, vertices: &[LineVertex]) {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Chunk Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let instance = InstanceRaw {
            model: Mat4::from_translation(coord.origin()).to_cols_array_2d(),
        };
        let instance_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Chunk Instance Buffer"),
            contents: bytemuck::cast_slice(&[instance]),
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.chunks.insert(
            coord,
            ChunkRenderData {
                vertex_buffer,
                instance_buffer,
                num_vertices: vertices.len() as u32,
            },
        );
    }

    fn remove_chunk(&mut self, coord: ChunkCoord) {
        self.chunks.remove(&coord);
    }
}

pub struct State {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    model_pipeline: wgpu::RenderPipeline,
    terrain_pipeline: wgpu::RenderPipeline,
    camera: FollowCamera,
    projection: Projection,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    camera_controller: CameraController,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    player: Player,
    player_controller: PlayerController,
    character: Model,
    character_instance_buffer: wgpu::Buffer,
    streamer: TerrainStreamer,
    terrain_chunks: HashMap<ChunkCoord, ChunkRenderData>,
    last_frame: Instant,
}

impl State {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await?;
        log::info!("GPU adapter: {}", adapter.get_info().name);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(*surface_caps.formats.first().context("no surface formats")?);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let streamer = TerrainStreamer::new(HeightField::default());
        let spawn_height = streamer.height_at(0.0, 0.0);
        let player = Player::new(glam::Vec3::new(0.0, spawn_height, 0.0));

        let camera = FollowCamera::new(player.focus_point());
        let projection = Projection::new(config.width, config.height, 45.0, 0.1, 200.0);
        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("camera_bind_group_layout"),
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let (depth_texture, depth_view) = create_depth_texture(&device, &config);

        let texture_bind_group_layout = model::texture_bind_group_layout(&device);
        let character = model::load_character(
            &device,
            &queue,
            &texture_bind_group_layout,
            CHARACTER_MODEL_PATH,
        );

        let character_instance = InstanceRaw {
            model: player.model_matrix().to_cols_array_2d(),
        };
        let character_instance_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Character Instance Buffer"),
                contents: bytemuck::cast_slice(&[character_instance]),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });

        let model_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Model Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });
        let terrain_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Terrain Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("terrain.wgsl").into()),
        });

        let model_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Model Pipeline Layout"),
                bind_group_layouts: &[&camera_bind_group_layout, &texture_bind_group_layout],
                push_constant_ranges: &[],
            });
        let model_pipeline = create_pipeline(
            &device,
            "Model Pipeline",
            &model_pipeline_layout,
            &model_shader,
            &[Vertex::desc(), InstanceRaw::desc()],
            config.format,
            wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
        );

        let terrain_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Terrain Pipeline Layout"),
                bind_group_layouts: &[&camera_bind_group_layout],
                push_constant_ranges: &[],
            });
        let terrain_pipeline = create_pipeline(
            &device,
            "Terrain Pipeline",
            &terrain_pipeline_layout,
            &terrain_shader,
            &[LineVertex::desc(), InstanceRaw::desc()],
            config.format,
            wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            model_pipeline,
            terrain_pipeline,
            camera,
            projection,
            camera_uniform,
            camera_buffer,
            camera_bind_group,
            camera_controller: CameraController::new(1.5, 0.3),
            depth_texture,
            depth_view,
            player,
            player_controller: PlayerController::default(),
            character,
            character_instance_buffer,
            streamer,
            terrain_chunks: HashMap::new(),
            last_frame: Instant::now(),
        })
    }

    pub fn size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.size
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.projection.resize(new_size.width, new_size.height);

            let (depth_texture, depth_view) = create_depth_texture(&self.device, &self.config);
            self.depth_texture = depth_texture;
            self.depth_view = depth_view;
        }
    }

    pub fn input(&mut self, event: &winit::event::WindowEvent) -> bool {
        self.camera_controller.process_events(event) || self.player_controller.process_events(event)
    }

    pub fn mouse_motion(&mut self, delta: (f64, f64)) {
        self.camera_controller.process_mouse_motion(delta.0, delta.1);
    }

    /// Advance one frame: apply input, move the player, run a streaming
    /// tick, then refresh the camera and instance uniforms.
    pub fn update(&mut self) {
        let now = Instant::now();
        // long gaps (first frame, window drags) are clamped
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        self.camera_controller.update_camera(&mut self.camera);
        self.player_controller.update_player(
            &mut self.player,
            self.camera.forward_xz(),
            &self.streamer,
            dt,
        );

        let mut scene = ChunkUploader {
            device: &self.device,
            chunks: &mut self.terrain_chunks,
        };
        self.streamer
            .update(self.player.position.x, self.player.position.z, &mut scene);

        self.camera.follow(self.player.focus_point());
        self.camera_uniform.update_view_proj(&self.camera, &self.projection);
        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera_uniform]),
        );

        let character_instance = InstanceRaw {
            model: self.player.model_matrix().to_cols_array_2d(),
        };
        self.queue.write_buffer(
            &self.character_instance_buffer,
            0,
            bytemuck::cast_slice(&[character_instance]),
        );
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.04,
                            b: 0.08,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);

            render_pass.set_pipeline(&self.terrain_pipeline);
            for chunk in self.terrain_chunks.values() {
                render_pass.set_vertex_buffer(0, chunk.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, chunk.instance_buffer.slice(..));
                render_pass.draw(0..chunk.num_vertices, 0..1);
            }

            render_pass.set_pipeline(&self.model_pipeline);
            render_pass.draw_model(&self.character, &self.character_instance_buffer, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> (wgpu::Texture, wgpu::TextureView) {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    buffers: &[wgpu::VertexBufferLayout],
    format: wgpu::TextureFormat,
    primitive: wgpu::PrimitiveState,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive,
        depth_stencil: Some(wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
