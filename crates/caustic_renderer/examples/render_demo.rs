//! Headless demo: a glass ball, a CSG lens and a marble torus knot over a
//! floor, lit by a point light, rendered with caustic photons and written
//! to PNG.
//!
//! Usage: `cargo run --example render_demo -- [output.png] [whitted|path|photon]`

use std::f32::consts::FRAC_PI_2;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use caustic_renderer::{
    AmbientLight, Camera, Coefficients, Color, CsgOp, IntegratorMode, Light, Mat4, Material, PerlinNoise,
    PhotonSettings, PointLight, Primitive, ProgressiveRender, RenderSettings, Renderer, SceneBuilder, Shape, Sphere,
    Square, TorusKnot, Transform, Vec3,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| "caustics.png".to_string());
    let mode = match args.next().as_deref() {
        None | Some("photon") => IntegratorMode::PhotonMapped,
        Some("whitted") => IntegratorMode::Whitted,
        Some("path") => IntegratorMode::PathTrace,
        Some(other) => bail!("unknown integrator '{other}' (expected whitted, path or photon)"),
    };

    let settings = RenderSettings::default()
        .with_resolution(320, 240)
        .with_depth(5, Color::splat(0.01))
        .with_antialiasing(2, false)
        .with_path_tracing(0.8, 16)
        .with_background(Color::new(0.05, 0.05, 0.08))
        .with_seed(42);

    let camera = Camera::new()
        .with_position(Vec3::new(0.0, 3.0, 7.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y)
        .with_fov(40.0)
        .with_aspect(320.0 / 240.0);

    let start = Instant::now();
    let mut renderer = Renderer::initialize(build_scene()?, camera, settings).context("scene setup failed")?;
    log::info!("Scene built in {:.2?}", start.elapsed());

    if mode == IntegratorMode::PhotonMapped {
        let photons = PhotonSettings::new(50_000, 80, 0.25).with_flux_scale(1.0);
        let map = renderer.build_photon_map(&photons)?;
        log::info!("Photon map holds {} caustic photons", map.len());
    }

    let stop = AtomicBool::new(false);
    let pixels = if mode == IntegratorMode::PathTrace {
        let progressive = ProgressiveRender::for_renderer(&renderer);
        for _ in 0..8 {
            if !progressive.iterate(&renderer, &stop) {
                bail!("progressive render stopped early");
            }
        }
        progressive.front().as_ref().clone()
    } else {
        renderer
            .render_frame(mode, &stop)
            .context("render was cancelled")?
            .to_rgb8()
    };

    let width = renderer.settings().width;
    let height = renderer.settings().height;
    let bytes: Vec<u8> = bytemuck::cast_slice(pixels.as_slice()).to_vec();
    let image = image::RgbImage::from_raw(width, height, bytes).context("frame size mismatch")?;
    image.save(&output).with_context(|| format!("writing {output}"))?;
    log::info!("Saved {}", output);
    Ok(())
}

fn build_scene() -> Result<SceneBuilder> {
    let mut scene = SceneBuilder::new();

    let floor = scene.add_material(Material::Phong(Coefficients {
        ambient: Color::splat(0.05),
        ..Coefficients::diffuse(Color::new(0.8, 0.8, 0.75))
    }));
    let glass = scene.add_material(Material::Phong(Coefficients::glass(1.5)));
    let tinted = scene.add_material(Material::Phong(Coefficients {
        absorb: Color::new(0.1, 0.6, 0.9),
        ..Coefficients::glass(1.45)
    }));

    let floor_xform = Mat4::from_scale(Vec3::new(10.0, 10.0, 1.0));
    let floor_xform = Mat4::from_rotation_x(-FRAC_PI_2) * floor_xform;
    scene.add_primitive(Primitive::new("floor", Shape::Square(Square), floor).with_transform(Transform::from_matrix(floor_xform)))?;

    let ball = Mat4::from_translation(Vec3::new(-1.2, 1.0, 0.0));
    scene.add_primitive(Primitive::new("ball", Shape::Sphere(Sphere), glass).with_transform(Transform::from_matrix(ball)))?;

    // Biconvex lens: intersection of two offset spheres
    let lens_a = Mat4::from_translation(Vec3::new(1.4, 1.0, 0.6)) * Mat4::from_scale(Vec3::splat(1.2));
    let lens_b = Mat4::from_translation(Vec3::new(1.4, 1.0, -0.6)) * Mat4::from_scale(Vec3::splat(1.2));
    scene.add_primitive(Primitive::new("lens_a", Shape::Sphere(Sphere), tinted).with_transform(Transform::from_matrix(lens_a)))?;
    scene.add_primitive(Primitive::new("lens_b", Shape::Sphere(Sphere), tinted).with_transform(Transform::from_matrix(lens_b)))?;
    scene.add_csg("lens", CsgOp::And, "lens_a", "lens_b")?;

    let marble = scene.add_material(Material::Phong(Coefficients {
        specular: Color::splat(0.4),
        shininess: 0.5,
        ..Coefficients::diffuse(Color::ONE)
    }));
    let knot = Mat4::from_translation(Vec3::new(0.0, 0.6, -2.2)) * Mat4::from_scale(Vec3::splat(0.6));
    scene.add_primitive(
        Primitive::new("knot", Shape::TorusKnot(TorusKnot::new(1.0, 0.2, 0.4, 1.5)), marble)
            .with_transform(Transform::from_matrix(knot))
            .with_solid_texture(Arc::new(PerlinNoise::new(4.0, 7, 7))),
    )?;

    scene.add_light(Light::Point(PointLight::new(Vec3::new(0.0, 6.0, 1.0), Color::splat(30.0))))?;
    scene.add_light(Light::Ambient(AmbientLight { color: Color::ONE }))?;
    Ok(scene)
}
