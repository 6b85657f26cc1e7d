use pivot::math::{rotation_x, rotation_y};
use pivot::{AppConfig, ColorSpace, Frame, RawGeometry, SceneEntity, Texture, Transform, Vec3};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::new().title("Pivot");

    let result = pivot::run_with_config(config, |ctx| {
        let plane = ctx.upload(&RawGeometry::plane(2.0).into_position_normal())?;
        let big_cube = ctx.upload(&RawGeometry::cube(0.5).into_position_normal())?;
        let small_cube = ctx.upload(&RawGeometry::cube(0.25).into_position_normal())?;

        let ground = ctx.scene.spawn(
            SceneEntity::new(Transform::default())
                .with_mesh(plane)
                .with_color(Vec3::new(0.0, 1.0, 0.0)),
        )?;

        let base = ctx.scene.spawn(
            SceneEntity::new(
                Transform::from_translation(Vec3::new(0.0, 0.25, 0.0)).rotation(rotation_y(40.0)),
            )
            .with_mesh(big_cube)
            .with_parent(ground)
            .with_color(Vec3::new(1.0, 0.0, 0.0)),
        )?;

        let spinner = ctx.scene.spawn(
            SceneEntity::new(Transform::from_translation(Vec3::new(0.5, 0.5, 0.0)))
                .with_mesh(small_cube)
                .with_parent(base)
                .with_color(Vec3::new(0.0, 0.5, 0.75)),
        )?;

        // Tangent-space cube lit through a generated normal map.
        let tiled = ctx.upload(&RawGeometry::cube(0.4).with_tangents()?)?;
        let white = Texture::solid(ctx.gpu, [230, 220, 200, 255], ColorSpace::Srgb, "Tile Diffuse");
        let gloss = Texture::solid(ctx.gpu, [160, 160, 160, 255], ColorSpace::Linear, "Tile Specular");
        let normals = Texture::tile_normals(ctx.gpu, 128, 4, 7);
        ctx.material(&white, &gloss, &normals);

        ctx.scene.spawn(
            SceneEntity::new(Transform::from_translation(Vec3::new(-0.6, 0.2, 0.3)))
                .with_mesh(tiled)
                .with_parent(ground),
        )?;

        Ok::<_, Box<dyn std::error::Error>>(move |frame: &mut Frame| {
            let angle = frame.time * 15.0;

            if let Ok(mut t) = frame.scene.transform_mut(ground) {
                t.rotation = rotation_y(angle);
            }
            if let Ok(mut t) = frame.scene.transform_mut(spinner) {
                t.rotation = rotation_x(angle);
            }
        })
    });

    if let Err(err) = result {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
