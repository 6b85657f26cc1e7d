use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use glam::{Mat4, Vec3};

use crate::geometry::{GeometryError, GeometryLoader, RawGeometry};
use crate::gpu::{GpuContext, GpuError};
use crate::math::{eye_matrix, perspective};
use crate::mesh::{MeshBuffer, MeshError};
use crate::render::{MaterialId, RenderBackend, RenderContext, WgpuBackend};
use crate::scene::Scene;
use crate::texture::{ColorSpace, Texture};

/// A point light, positioned in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub specular: Vec3,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, specular: Vec3) -> Self {
        Self {
            position,
            color,
            specular,
        }
    }
}

/// Failures that stop the app before or while it runs.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error("setup failed: {0}")]
    Setup(Box<dyn std::error::Error>),
}

/// Context provided during app setup.
pub struct SetupContext<'a> {
    pub gpu: &'a GpuContext,
    pub backend: &'a mut WgpuBackend,
    pub scene: &'a mut Scene,
}

impl SetupContext<'_> {
    /// Uploads procedurally built geometry.
    pub fn upload(&mut self, geometry: &RawGeometry) -> Result<MeshBuffer, MeshError> {
        geometry.upload(&mut *self.backend)
    }

    /// Loads, prepares and uploads a model file.
    pub fn load(&mut self, loader: GeometryLoader) -> Result<MeshBuffer, GeometryError> {
        loader.upload(&mut *self.backend)
    }

    pub fn texture_from_file(
        &self,
        path: &str,
        color_space: ColorSpace,
    ) -> Result<Texture, image::ImageError> {
        Texture::from_file(self.gpu, path, color_space)
    }

    /// Creates a material and makes it current for tangent-space draws.
    pub fn material(&mut self, diffuse: &Texture, specular: &Texture, normal: &Texture) -> MaterialId {
        let id = self.backend.create_material(diffuse, specular, normal);
        self.backend.set_material(Some(id));
        id
    }
}

/// Context provided each frame, before the scene is drawn.
pub struct Frame<'a> {
    pub scene: &'a mut Scene,
    pub backend: &'a mut WgpuBackend,
    /// Camera placement in world space; the scene is drawn with its inverse.
    pub eye: &'a mut Mat4,
    /// Total elapsed time in seconds.
    pub time: f32,
    /// Delta time since last frame in seconds.
    pub dt: f32,
    width: u32,
    height: u32,
}

impl Frame<'_> {
    /// Current frames per second.
    pub fn fps(&self) -> f32 {
        if self.dt > 0.0 { 1.0 / self.dt } else { 0.0 }
    }

    /// Screen width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Screen height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Configuration for the app window, camera and lights.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub clear_color: wgpu::Color,
    pub eye_position: Vec3,
    /// Rotation about X applied after translating the eye, in degrees.
    pub eye_pitch: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub lights: Vec<PointLight>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Pivot".to_string(),
            width: 750,
            height: 750,
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.1,
                a: 1.0,
            },
            eye_position: Vec3::new(0.0, 1.25, 3.0),
            eye_pitch: -15.0,
            fov: 45.0,
            near: 0.1,
            far: 100.0,
            lights: vec![
                PointLight::new(
                    Vec3::new(0.0, 10.0, 2.0),
                    Vec3::new(1.0, 0.3, 0.3),
                    Vec3::new(0.5, 0.0, 1.0),
                ),
                PointLight::new(
                    Vec3::new(5.0, 15.0, 3.0),
                    Vec3::new(0.0, 1.0, 1.0),
                    Vec3::new(0.0, 0.0, 1.0),
                ),
                PointLight::new(
                    Vec3::new(-5.0, 13.0, -1.0),
                    Vec3::new(1.0, 1.0, 1.0),
                    Vec3::new(0.5, 0.5, 0.8),
                ),
            ],
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn clear_color(mut self, r: f64, g: f64, b: f64) -> Self {
        self.clear_color = wgpu::Color { r, g, b, a: 1.0 };
        self
    }

    /// Places the eye at `position`, pitched by `pitch` degrees about X.
    pub fn eye(mut self, position: Vec3, pitch: f32) -> Self {
        self.eye_position = position;
        self.eye_pitch = pitch;
        self
    }

    pub fn fov(mut self, degrees: f32) -> Self {
        self.fov = degrees;
        self
    }

    pub fn clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Replaces the light rig. Lights past the shader limit are ignored.
    pub fn lights(mut self, lights: Vec<PointLight>) -> Self {
        self.lights = lights;
        self
    }
}

/// Uploads each light's eye-space position and colours to the built-in
/// light slots. Slots without a light are zeroed.
pub fn upload_lights(backend: &mut dyn RenderBackend, eye: Mat4, lights: &[PointLight]) {
    if lights.len() > crate::render::MAX_LIGHTS {
        log::warn!(
            "{} lights configured, only the first {} are used",
            lights.len(),
            crate::render::MAX_LIGHTS
        );
    }

    let view_inverse = eye.inverse();
    for index in 0..crate::render::MAX_LIGHTS {
        let Some(slots) = WgpuBackend::light(index) else {
            break;
        };
        let light = lights.get(index).copied().unwrap_or(PointLight::new(
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::ZERO,
        ));
        backend.upload_vec3(slots.position, view_inverse.transform_point3(light.position));
        backend.upload_vec3(slots.color, light.color);
        backend.upload_vec3(slots.specular, light.specular);
    }
}

/// Run an app with the default configuration.
pub fn run<S, F, E>(setup: S) -> Result<(), AppError>
where
    S: FnOnce(&mut SetupContext) -> Result<F, E> + 'static,
    F: FnMut(&mut Frame) + 'static,
    E: Into<Box<dyn std::error::Error>>,
{
    run_with_config(AppConfig::default(), setup)
}

/// Run an app with custom configuration.
///
/// `setup` runs once the window and GPU exist; it builds meshes and entities
/// and returns the per-frame closure. Each frame the closure runs first, then
/// the projection and lights are uploaded, the scene is drawn with the
/// inverse eye matrix, and the frame is submitted. Returns when the window
/// closes.
///
/// # Example
/// ```no_run
/// use pivot::{AppConfig, RawGeometry, SceneEntity, Transform, Vec3};
///
/// pivot::run_with_config(AppConfig::new().title("Spin"), |ctx| {
///     let cube = ctx.upload(&RawGeometry::cube(1.0).into_position_normal())?;
///     let e = ctx.scene.spawn(
///         SceneEntity::new(Transform::default()).with_mesh(cube).with_color(Vec3::X),
///     )?;
///
///     Ok::<_, Box<dyn std::error::Error>>(move |frame: &mut pivot::Frame| {
///         let spin = pivot::math::rotation_y(frame.time * 15.0);
///         if let Ok(mut t) = frame.scene.transform_mut(e) {
///             t.rotation = spin;
///         }
///     })
/// })?;
/// # Ok::<(), pivot::AppError>(())
/// ```
pub fn run_with_config<S, F, E>(config: AppConfig, setup: S) -> Result<(), AppError>
where
    S: FnOnce(&mut SetupContext) -> Result<F, E> + 'static,
    F: FnMut(&mut Frame) + 'static,
    E: Into<Box<dyn std::error::Error>>,
{
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = PivotApp::Pending {
        config,
        setup: Some(Box::new(
            move |ctx: &mut SetupContext<'_>| -> Result<Box<dyn FnMut(&mut Frame)>, Box<dyn std::error::Error>> {
                match setup(ctx) {
                    Ok(frame_fn) => Ok(Box::new(frame_fn)),
                    Err(err) => Err(err.into()),
                }
            },
        )),
    };

    event_loop.run_app(&mut app)?;

    match app {
        PivotApp::Failed(err) => Err(err),
        _ => Ok(()),
    }
}

type SetupFn = Box<dyn FnOnce(&mut SetupContext) -> Result<Box<dyn FnMut(&mut Frame)>, Box<dyn std::error::Error>>>;

enum PivotApp {
    Pending {
        config: AppConfig,
        setup: Option<SetupFn>,
    },
    Running {
        window: Arc<Window>,
        gpu: GpuContext,
        backend: WgpuBackend,
        scene: Scene,
        config: AppConfig,
        eye: Mat4,
        frame_fn: Box<dyn FnMut(&mut Frame)>,
        start_time: Instant,
        last_frame: Instant,
    },
    Failed(AppError),
}

impl PivotApp {
    fn start(
        event_loop: &ActiveEventLoop,
        config: AppConfig,
        setup: SetupFn,
    ) -> Result<PivotApp, AppError> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let gpu = GpuContext::new(window.clone())?;
        let mut backend = WgpuBackend::new(&gpu);
        let mut scene = Scene::new();

        let frame_fn = {
            let mut ctx = SetupContext {
                gpu: &gpu,
                backend: &mut backend,
                scene: &mut scene,
            };
            setup(&mut ctx).map_err(AppError::Setup)?
        };

        log::info!(
            "'{}' running with {} root entities",
            config.title,
            scene.roots().len()
        );

        let eye = eye_matrix(config.eye_position, config.eye_pitch);
        window.request_redraw();

        Ok(PivotApp::Running {
            window,
            gpu,
            backend,
            scene,
            config,
            eye,
            frame_fn,
            start_time: Instant::now(),
            last_frame: Instant::now(),
        })
    }
}

impl ApplicationHandler for PivotApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let PivotApp::Pending { config, setup } = self else {
            return;
        };
        let Some(setup) = setup.take() else {
            return;
        };

        match PivotApp::start(event_loop, config.clone(), setup) {
            Ok(running) => *self = running,
            Err(err) => {
                log::error!("startup failed: {}", err);
                *self = PivotApp::Failed(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let PivotApp::Running {
            window,
            gpu,
            backend,
            scene,
            config,
            eye,
            frame_fn,
            start_time,
            last_frame,
        } = self
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                gpu.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let time = start_time.elapsed().as_secs_f32();
                let dt = now.duration_since(*last_frame).as_secs_f32();
                *last_frame = now;

                let mut frame = Frame {
                    scene: &mut *scene,
                    backend: &mut *backend,
                    eye: &mut *eye,
                    time,
                    dt,
                    width: gpu.width(),
                    height: gpu.height(),
                };
                frame_fn(&mut frame);

                render_frame(gpu, backend, scene, config, *eye);
                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn render_frame(gpu: &mut GpuContext, backend: &mut WgpuBackend, scene: &Scene, config: &AppConfig, eye: Mat4) {
    let output = match gpu.surface.get_current_texture() {
        Ok(output) => output,
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            let (width, height) = (gpu.width(), gpu.height());
            gpu.resize(width, height);
            return;
        }
        Err(err) => {
            log::warn!("skipping frame: {}", err);
            return;
        }
    };
    let view = output
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let projection = perspective(config.fov, gpu.aspect(), config.near, config.far);
    backend.upload_matrix(WgpuBackend::PROJECTION, projection);
    upload_lights(&mut *backend, eye, &config.lights);

    let bindings = WgpuBackend::bindings();
    let mut ctx = RenderContext::new(&mut *backend, WgpuBackend::uniforms(), &bindings);
    if let Err(err) = scene.draw_all(eye.inverse(), &mut ctx) {
        log::error!("scene draw failed: {}", err);
    }

    backend.submit(&view, gpu.width(), gpu.height(), config.clear_color);
    output.present();
}
