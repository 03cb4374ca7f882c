//! Demo: a spinning, textured, lit cube.

use softrast::prelude::*;
use softrast::Light;

const WINDOW_WIDTH: u32 = 800;
const WINDOW_HEIGHT: u32 = 600;

/// Procedural checkerboard so the demo needs no asset files.
fn checkerboard_texture() -> Result<Texture, softrast::TextureError> {
    const SIZE: u32 = 256;
    const CELL: u32 = 32;
    let mut rgba = Vec::with_capacity((SIZE * SIZE * 4) as usize);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let even = ((x / CELL) + (y / CELL)) % 2 == 0;
            if even {
                rgba.extend_from_slice(&[230, 230, 230, 255]);
            } else {
                rgba.extend_from_slice(&[40, 90, 160, 255]);
            }
        }
    }
    Texture::from_rgba(
        &rgba,
        SIZE,
        SIZE,
        WrapMode::Repeat,
        FilterMode::Bilinear,
        true,
    )
}

fn main() -> Result<(), String> {
    let mut window = Window::new("softrast", WINDOW_WIDTH, WINDOW_HEIGHT)?;
    let mut renderer = Renderer::new(WINDOW_WIDTH, WINDOW_HEIGHT);

    let texture = checkerboard_texture().map_err(|e| e.to_string())?;
    let diffuse_handle = renderer.context_mut().add_texture(texture);
    renderer.context_mut().add_light(Light::Directional {
        intensity: Vec3::new(0.9, 0.9, 0.85),
        direction: Vec3::new(0.4, 0.8, -0.5).normalize(),
    });

    let mut cube = DrawMesh::cube();
    cube.material = Material {
        model: ShadingModel::BlinnPhong,
        ambient: Vec3::new(0.15, 0.15, 0.15),
        specular: Vec3::new(0.4, 0.4, 0.4),
        shininess: 32.0,
        diffuse_texture: diffuse_handle,
        ..Material::default()
    };

    let eye = Vec3::new(0.0, 1.5, -5.0);
    renderer.set_view_matrix(Mat4::look_at_lh(eye, Vec3::ZERO, Vec3::UP));
    renderer.set_viewer_pos(eye);

    let mut limiter = FrameLimiter::new(&window);
    let mut angle: f32 = 0.0;
    loop {
        match window.poll_events() {
            WindowEvent::Quit => break,
            WindowEvent::Resize(w, h) => {
                renderer.resize(w, h);
                window.resize(w, h)?;
            }
            WindowEvent::None => {}
        }

        let delta_ms = limiter.wait_and_get_delta(&window);
        angle += delta_ms as f32 * 0.001;

        renderer.set_model_matrix(Mat4::rotation_y(angle) * Mat4::rotation_x(angle * 0.4));
        renderer.clear(Vec4::new(0.06, 0.06, 0.08, 1.0));
        renderer.draw(&cube);
        window.present(renderer.present())?;
    }

    Ok(())
}
