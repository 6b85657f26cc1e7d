//! Parent/child entity hierarchy and world-transform composition.
//!
//! Entities live in a [`hecs::World`] arena and refer to their parent through
//! a generational [`Entity`] handle, so a despawned parent is detected instead
//! of dangling. Every entity has a [`Transform`]; [`MeshBuffer`], [`Parent`]
//! and [`SurfaceColor`] are optional components.
//!
//! World transforms are derived, never stored:
//!
//! ```text
//! world(e) = world(parent(e)) * local(e)     // child
//! world(e) = local(e)                        // root
//! ```
//!
//! # Example
//!
//! ```
//! use pivot::{RawGeometry, RecordingBackend, Scene, SceneEntity, Transform, Vec3};
//!
//! let mut backend = RecordingBackend::new();
//! let cube = RawGeometry::cube(1.0).into_position_normal();
//!
//! let mut scene = Scene::new();
//! let a = scene.spawn(SceneEntity::new(Transform::default()).with_mesh(cube.upload(&mut backend)?))?;
//! let b = scene.spawn(
//!     SceneEntity::new(Transform::from_translation(Vec3::Y))
//!         .with_mesh(cube.upload(&mut backend)?)
//!         .with_parent(a),
//! )?;
//!
//! let center = scene.world_transform(b)?.transform_point3(Vec3::ZERO);
//! assert!(center.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-6));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;

use glam::{Mat4, Vec3};
use hecs::{Entity, World};

use crate::math::normal_matrix;
use crate::mesh::MeshBuffer;
use crate::render::{RenderContext, RenderError};
use crate::transform::Transform;

/// Handle to the entity this one is positioned relative to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parent(pub Entity);

/// Flat colour uploaded alongside an entity's matrices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceColor(pub Vec3);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("entity {0:?} does not exist")]
    NoSuchEntity(Entity),
    #[error("entity {child:?} refers to parent {parent:?}, which no longer exists")]
    StaleParent { child: Entity, parent: Entity },
    #[error("entity {0:?} has no {1} component")]
    MissingComponent(Entity, &'static str),
    #[error("parenting {child:?} under {parent:?} would make it its own ancestor")]
    Cycle { child: Entity, parent: Entity },
    #[error("entity {0:?} still has children")]
    HasChildren(Entity),
    #[error("entity {0:?} has no mesh to draw")]
    MissingMesh(Entity),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Components of a new entity, spawned with [`Scene::spawn`].
#[derive(Debug, Default)]
pub struct SceneEntity {
    pub transform: Transform,
    /// Entities without a mesh act as pure grouping nodes.
    pub mesh: Option<MeshBuffer>,
    pub parent: Option<Entity>,
    pub color: Option<Vec3>,
}

impl SceneEntity {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            ..Default::default()
        }
    }

    pub fn with_mesh(mut self, mesh: MeshBuffer) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_parent(mut self, parent: Entity) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = Some(color);
        self
    }
}

/// An arena of entities forming a forest of transform hierarchies.
#[derive(Default)]
pub struct Scene {
    world: World,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the underlying ECS world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the underlying ECS world.
    ///
    /// Edits made here skip the checks of [`spawn`](Self::spawn),
    /// [`set_parent`](Self::set_parent) and [`despawn`](Self::despawn); stale
    /// parents and cycles introduced this way surface as errors from
    /// [`world_transform`](Self::world_transform) and [`draw_all`](Self::draw_all).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Adds an entity. Its parent, if any, must be alive.
    pub fn spawn(&mut self, entity: SceneEntity) -> Result<Entity, SceneError> {
        if let Some(parent) = entity.parent {
            if !self.world.contains(parent) {
                return Err(SceneError::NoSuchEntity(parent));
            }
        }

        let mut builder = hecs::EntityBuilder::new();
        builder.add(entity.transform);
        if let Some(mesh) = entity.mesh {
            builder.add(mesh);
        }
        if let Some(parent) = entity.parent {
            builder.add(Parent(parent));
        }
        if let Some(color) = entity.color {
            builder.add(SurfaceColor(color));
        }

        let id = self.world.spawn(builder.build());
        log::debug!("spawned {:?} (parent {:?})", id, entity.parent);
        Ok(id)
    }

    /// Removes an entity that no live entity uses as its parent.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), SceneError> {
        if !self.world.contains(entity) {
            return Err(SceneError::NoSuchEntity(entity));
        }
        if !self.children(entity).is_empty() {
            return Err(SceneError::HasChildren(entity));
        }
        self.world
            .despawn(entity)
            .map_err(|_| SceneError::NoSuchEntity(entity))
    }

    /// Re-parents `child`, or detaches it with `None`.
    ///
    /// Rejects attachments that would make `child` its own ancestor.
    pub fn set_parent(&mut self, child: Entity, parent: Option<Entity>) -> Result<(), SceneError> {
        if !self.world.contains(child) {
            return Err(SceneError::NoSuchEntity(child));
        }

        let Some(parent) = parent else {
            // Already a root when there's nothing to remove.
            let _ = self.world.remove_one::<Parent>(child);
            return Ok(());
        };

        if !self.world.contains(parent) {
            return Err(SceneError::NoSuchEntity(parent));
        }

        let mut ancestor = Some(parent);
        let mut steps = 0;
        while let Some(current) = ancestor {
            if current == child || steps > self.world.len() as usize {
                return Err(SceneError::Cycle { child, parent });
            }
            ancestor = self.parent(current)?;
            steps += 1;
        }

        self.world
            .insert_one(child, Parent(parent))
            .map_err(|_| SceneError::NoSuchEntity(child))
    }

    /// The entity's parent handle, without checking that it is still alive.
    pub fn parent(&self, entity: Entity) -> Result<Option<Entity>, SceneError> {
        if !self.world.contains(entity) {
            return Err(SceneError::NoSuchEntity(entity));
        }
        Ok(self.world.get::<&Parent>(entity).ok().map(|p| p.0))
    }

    /// Direct children of `entity`, ordered by entity id.
    pub fn children(&self, entity: Entity) -> Vec<Entity> {
        let mut children: Vec<Entity> = self
            .world
            .query::<&Parent>()
            .iter()
            .filter(|(_, parent)| parent.0 == entity)
            .map(|(child, _)| child)
            .collect();
        children.sort_by_key(|e| e.id());
        children
    }

    /// Entities without a parent, ordered by entity id.
    pub fn roots(&self) -> Vec<Entity> {
        let mut roots: Vec<Entity> = self
            .world
            .query::<(&Transform, Option<&Parent>)>()
            .iter()
            .filter(|(_, (_, parent))| parent.is_none())
            .map(|(entity, _)| entity)
            .collect();
        roots.sort_by_key(|e| e.id());
        roots
    }

    pub fn transform(&self, entity: Entity) -> Result<Transform, SceneError> {
        self.world
            .get::<&Transform>(entity)
            .map(|t| *t)
            .map_err(|e| component_error(entity, e, "Transform"))
    }

    pub fn transform_mut(&mut self, entity: Entity) -> Result<hecs::RefMut<'_, Transform>, SceneError> {
        self.world
            .get::<&mut Transform>(entity)
            .map_err(|e| component_error(entity, e, "Transform"))
    }

    pub fn set_transform(&mut self, entity: Entity, transform: Transform) -> Result<(), SceneError> {
        *self.transform_mut(entity)? = transform;
        Ok(())
    }

    /// The entity's transform relative to its parent.
    pub fn local_matrix(&self, entity: Entity) -> Result<Mat4, SceneError> {
        self.world
            .get::<&Transform>(entity)
            .map(|t| t.matrix())
            .map_err(|e| component_error(entity, e, "Transform"))
    }

    /// Composes local matrices from the root down to `entity`.
    ///
    /// Fails with [`SceneError::StaleParent`] if any ancestor handle no longer
    /// resolves.
    pub fn world_transform(&self, entity: Entity) -> Result<Mat4, SceneError> {
        let mut matrix = self.local_matrix(entity)?;
        let mut current = entity;
        let mut steps = 0;

        while let Some(parent) = self.parent(current)? {
            if !self.world.contains(parent) {
                return Err(SceneError::StaleParent {
                    child: current,
                    parent,
                });
            }
            steps += 1;
            if steps > self.world.len() as usize {
                return Err(SceneError::Cycle {
                    child: current,
                    parent,
                });
            }
            matrix = self.local_matrix(parent)? * matrix;
            current = parent;
        }

        Ok(matrix)
    }

    /// Draws one entity: uploads `view_inverse * world` as the model-view
    /// matrix, its normal matrix, and (when the colour uniform exists) its
    /// [`SurfaceColor`] or white, then draws the mesh once.
    pub fn draw(
        &self,
        entity: Entity,
        view_inverse: Mat4,
        ctx: &mut RenderContext<'_>,
    ) -> Result<(), SceneError> {
        let world = self.world_transform(entity)?;
        self.draw_with_world(entity, world, view_inverse, ctx)
    }

    /// Draws every entity with a mesh, parents before children.
    ///
    /// Parent handles are validated before anything is drawn. Each world
    /// matrix is computed once and handed down to the children; roots and
    /// siblings are visited in entity-id order. Returns the number of draws.
    pub fn draw_all(&self, view_inverse: Mat4, ctx: &mut RenderContext<'_>) -> Result<usize, SceneError> {
        let mut children: HashMap<Entity, Vec<Entity>> = HashMap::new();
        for (child, parent) in self.world.query::<&Parent>().iter() {
            if !self.world.contains(parent.0) {
                return Err(SceneError::StaleParent {
                    child,
                    parent: parent.0,
                });
            }
            children.entry(parent.0).or_default().push(child);
        }
        for siblings in children.values_mut() {
            siblings.sort_by_key(|e| e.id());
        }

        let mut order = Vec::new();
        let mut stack: Vec<(Entity, Mat4)> = self
            .roots()
            .into_iter()
            .rev()
            .map(|root| (root, Mat4::IDENTITY))
            .collect();
        while let Some((entity, parent_world)) = stack.pop() {
            let world = parent_world * self.local_matrix(entity)?;
            order.push((entity, world));
            if let Some(siblings) = children.get(&entity) {
                stack.extend(siblings.iter().rev().map(|&child| (child, world)));
            }
        }

        // Anything not reachable from a root sits on a parent cycle.
        if order.len() < self.world.len() as usize {
            let reached: std::collections::HashSet<Entity> = order.iter().map(|(e, _)| *e).collect();
            if let Some((child, parent)) = self
                .world
                .query::<&Parent>()
                .iter()
                .find(|(e, _)| !reached.contains(e))
                .map(|(e, p)| (e, p.0))
            {
                return Err(SceneError::Cycle { child, parent });
            }
        }

        let mut draws = 0;
        for (entity, world) in order {
            if self.world.get::<&MeshBuffer>(entity).is_err() {
                continue;
            }
            self.draw_with_world(entity, world, view_inverse, ctx)?;
            draws += 1;
        }

        Ok(draws)
    }

    fn draw_with_world(
        &self,
        entity: Entity,
        world: Mat4,
        view_inverse: Mat4,
        ctx: &mut RenderContext<'_>,
    ) -> Result<(), SceneError> {
        let mesh = self
            .world
            .get::<&MeshBuffer>(entity)
            .map_err(|_| SceneError::MissingMesh(entity))?;

        let model_view = view_inverse * world;
        ctx.backend.upload_matrix(ctx.uniforms.model_view, model_view);
        ctx.backend
            .upload_matrix(ctx.uniforms.normal_matrix, normal_matrix(model_view));

        // Uniforms persist between draws; uncoloured entities reset to white.
        if let Some(location) = ctx.uniforms.color {
            let color = self
                .world
                .get::<&SurfaceColor>(entity)
                .map_or(Vec3::ONE, |c| c.0);
            ctx.backend.upload_vec3(location, color);
        }

        mesh.draw(&mut *ctx.backend, ctx.bindings)?;
        Ok(())
    }
}

fn component_error(entity: Entity, error: hecs::ComponentError, component: &'static str) -> SceneError {
    match error {
        hecs::ComponentError::NoSuchEntity => SceneError::NoSuchEntity(entity),
        hecs::ComponentError::MissingComponent(_) => SceneError::MissingComponent(entity, component),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RawGeometry;
    use crate::math::{rotation_x, rotation_y};
    use crate::mesh::AttributeBindings;
    use crate::render::{Command, RecordingBackend, ShaderUniforms, UniformLocation};
    use crate::vertex::VertexKind;
    use glam::Quat;

    const UNIFORMS: ShaderUniforms = ShaderUniforms {
        model_view: UniformLocation(0),
        normal_matrix: UniformLocation(1),
        projection: UniformLocation(2),
        color: Some(UniformLocation(3)),
    };

    fn cube(backend: &mut RecordingBackend, size: f32) -> MeshBuffer {
        RawGeometry::cube(size)
            .into_position_normal()
            .upload(backend)
            .unwrap()
    }

    fn node(scene: &mut Scene, transform: Transform, parent: Option<Entity>) -> Entity {
        scene
            .spawn(SceneEntity {
                transform,
                parent,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn root_world_transform_is_local() {
        let mut scene = Scene::new();
        let t = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0))
            .rotation(rotation_y(30.0))
            .scale(Vec3::new(1.0, 2.0, 0.5));
        let root = node(&mut scene, t, None);

        assert_eq!(scene.world_transform(root).unwrap(), t.matrix());
        assert_eq!(scene.roots(), vec![root]);
    }

    #[test]
    fn child_composes_with_parent() {
        let mut scene = Scene::new();
        let parent = node(
            &mut scene,
            Transform::from_translation(Vec3::new(0.0, 0.25, 0.0)).rotation(rotation_y(40.0)),
            None,
        );
        let child = node(
            &mut scene,
            Transform::from_translation(Vec3::new(0.5, 0.5, 0.0)).rotation(rotation_x(10.0)),
            Some(parent),
        );

        let expected = scene.world_transform(parent).unwrap() * scene.local_matrix(child).unwrap();
        assert!(scene.world_transform(child).unwrap().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn composition_holds_for_deep_chains() {
        let mut scene = Scene::new();
        let mut chain = vec![node(&mut scene, Transform::from_translation(Vec3::X), None)];
        for i in 1..5 {
            let t = Transform::from_translation(Vec3::new(0.0, i as f32, 0.0))
                .rotation(Quat::from_rotation_z(0.3 * i as f32))
                .uniform_scale(0.9);
            let parent = *chain.last().unwrap();
            chain.push(node(&mut scene, t, Some(parent)));
        }

        for pair in chain.windows(2) {
            let expected =
                scene.world_transform(pair[0]).unwrap() * scene.local_matrix(pair[1]).unwrap();
            assert!(scene.world_transform(pair[1]).unwrap().abs_diff_eq(expected, 1e-5));
        }

        let product = chain
            .iter()
            .fold(Mat4::IDENTITY, |m, &e| m * scene.local_matrix(e).unwrap());
        assert!(scene.world_transform(chain[4]).unwrap().abs_diff_eq(product, 1e-5));
    }

    #[test]
    fn child_is_placed_in_parent_frame() {
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::new();

        let a = scene
            .spawn(SceneEntity::new(Transform::default()).with_mesh(cube(&mut backend, 1.0)))
            .unwrap();
        let b = scene
            .spawn(
                SceneEntity::new(Transform::from_translation(Vec3::Y))
                    .with_mesh(cube(&mut backend, 0.5))
                    .with_parent(a),
            )
            .unwrap();

        let small = RawGeometry::cube(0.5);
        let center = scene.world_transform(b).unwrap().transform_point3(small.center());
        assert!(center.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-6));

        // Moving and turning A carries B along: B stays at (0,1,0) in A's frame.
        let moved = Transform::from_translation(Vec3::new(3.0, -2.0, 5.0))
            .rotation(Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0).normalize(), 1.1));
        scene.set_transform(a, moved).unwrap();

        let world_b = scene.world_transform(b).unwrap();
        let in_a = scene.world_transform(a).unwrap().inverse() * world_b;
        assert!(
            in_a.transform_point3(Vec3::ZERO)
                .abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-5)
        );
        assert!(
            world_b
                .transform_point3(Vec3::ZERO)
                .abs_diff_eq(moved.matrix().transform_point3(Vec3::Y), 1e-5)
        );
    }

    #[test]
    fn transform_mut_updates_world_transform() {
        let mut scene = Scene::new();
        let root = node(&mut scene, Transform::default(), None);
        let child = node(&mut scene, Transform::from_translation(Vec3::X), Some(root));

        scene.transform_mut(root).unwrap().translation = Vec3::new(0.0, 0.0, -2.0);

        let origin = scene.world_transform(child).unwrap().transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(1.0, 0.0, -2.0), 1e-6));
    }

    #[test]
    fn draw_uploads_model_view_normal_and_color() {
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::new();
        let t = Transform::from_translation(Vec3::new(0.0, 0.25, 0.0))
            .rotation(rotation_y(40.0))
            .uniform_scale(2.0);
        let e = scene
            .spawn(
                SceneEntity::new(t)
                    .with_mesh(cube(&mut backend, 0.5))
                    .with_color(Vec3::new(1.0, 0.0, 0.0)),
            )
            .unwrap();

        let view_inverse = Mat4::from_translation(Vec3::new(0.0, -1.25, -3.0));
        let bindings = AttributeBindings::standard();
        backend.clear();
        {
            let mut ctx = RenderContext::new(&mut backend, UNIFORMS, &bindings);
            scene.draw(e, view_inverse, &mut ctx).unwrap();
        }

        let model_view = view_inverse * t.matrix();
        assert!(
            backend
                .last_matrix(UNIFORMS.model_view)
                .unwrap()
                .abs_diff_eq(model_view, 1e-6)
        );
        assert!(
            backend
                .last_matrix(UNIFORMS.normal_matrix)
                .unwrap()
                .abs_diff_eq(normal_matrix(model_view), 1e-6)
        );
        assert_eq!(backend.last_vec3(UniformLocation(3)), Some(Vec3::new(1.0, 0.0, 0.0)));

        let draws: Vec<_> = backend.draws().collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 36);
        assert_eq!(draws[0].kind, VertexKind::PositionNormal);
    }

    #[test]
    fn color_is_skipped_without_a_uniform() {
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::new();
        let e = scene
            .spawn(
                SceneEntity::new(Transform::default())
                    .with_mesh(cube(&mut backend, 1.0))
                    .with_color(Vec3::ONE),
            )
            .unwrap();

        let uniforms = ShaderUniforms {
            color: None,
            ..UNIFORMS
        };
        let bindings = AttributeBindings::standard();
        let mut ctx = RenderContext::new(&mut backend, uniforms, &bindings);
        scene.draw(e, Mat4::IDENTITY, &mut ctx).unwrap();

        assert_eq!(backend.last_vec3(UniformLocation(3)), None);
    }

    #[test]
    fn uncoloured_entities_do_not_inherit_the_previous_color() {
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::new();
        scene
            .spawn(
                SceneEntity::new(Transform::default())
                    .with_mesh(cube(&mut backend, 1.0))
                    .with_color(Vec3::new(1.0, 0.0, 0.0)),
            )
            .unwrap();
        scene
            .spawn(SceneEntity::new(Transform::from_translation(Vec3::X)).with_mesh(cube(&mut backend, 0.5)))
            .unwrap();

        let bindings = AttributeBindings::standard();
        backend.clear();
        {
            let mut ctx = RenderContext::new(&mut backend, UNIFORMS, &bindings);
            assert_eq!(scene.draw_all(Mat4::IDENTITY, &mut ctx).unwrap(), 2);
        }

        let mut current = None;
        let mut at_draw = Vec::new();
        for command in backend.commands() {
            match command {
                Command::UploadVec3(location, value) if Some(*location) == UNIFORMS.color => {
                    current = Some(*value)
                }
                Command::Draw(_) => at_draw.push(current),
                _ => {}
            }
        }
        assert_eq!(at_draw, vec![Some(Vec3::new(1.0, 0.0, 0.0)), Some(Vec3::ONE)]);
    }

    #[test]
    fn drawing_a_group_node_is_an_error() {
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::new();
        let group = node(&mut scene, Transform::default(), None);

        let bindings = AttributeBindings::standard();
        let mut ctx = RenderContext::new(&mut backend, UNIFORMS, &bindings);
        assert_eq!(
            scene.draw(group, Mat4::IDENTITY, &mut ctx),
            Err(SceneError::MissingMesh(group))
        );
        assert_eq!(backend.draws().count(), 0);
    }

    #[test]
    fn missing_binding_issues_no_draw() {
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::new();
        let mesh = RawGeometry::cube(1.0).upload(&mut backend).unwrap();
        let e = scene
            .spawn(SceneEntity::new(Transform::default()).with_mesh(mesh))
            .unwrap();

        let bindings = AttributeBindings::new()
            .with(crate::vertex::Attribute::Position, 0)
            .with(crate::vertex::Attribute::Normal, 1);
        let mut ctx = RenderContext::new(&mut backend, UNIFORMS, &bindings);
        let err = scene.draw(e, Mat4::IDENTITY, &mut ctx).unwrap_err();

        assert!(matches!(err, SceneError::Render(RenderError::MissingAttribute { .. })));
        assert_eq!(backend.draws().count(), 0);
    }

    #[test]
    fn draw_all_visits_parents_before_children() {
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::new();

        let plane = scene
            .spawn(SceneEntity::new(Transform::default()).with_mesh(cube(&mut backend, 2.0)))
            .unwrap();
        let group = node(&mut scene, Transform::from_translation(Vec3::X), Some(plane));
        let cube1 = scene
            .spawn(
                SceneEntity::new(Transform::from_translation(Vec3::Y))
                    .with_mesh(cube(&mut backend, 0.5))
                    .with_parent(group),
            )
            .unwrap();
        let cube2 = scene
            .spawn(
                SceneEntity::new(Transform::from_translation(Vec3::Z))
                    .with_mesh(cube(&mut backend, 0.25))
                    .with_parent(cube1),
            )
            .unwrap();

        let bindings = AttributeBindings::standard();
        backend.clear();
        let count = {
            let mut ctx = RenderContext::new(&mut backend, UNIFORMS, &bindings);
            scene.draw_all(Mat4::IDENTITY, &mut ctx).unwrap()
        };

        assert_eq!(count, 3);
        let model_views: Vec<Mat4> = backend.matrices(UNIFORMS.model_view).collect();
        let expected: Vec<Mat4> = [plane, cube1, cube2]
            .iter()
            .map(|&e| scene.world_transform(e).unwrap())
            .collect();
        assert_eq!(model_views.len(), 3);
        for (got, want) in model_views.iter().zip(&expected) {
            assert!(got.abs_diff_eq(*want, 1e-6));
        }
    }

    #[test]
    fn spawn_rejects_dead_parent() {
        let mut scene = Scene::new();
        let gone = node(&mut scene, Transform::default(), None);
        scene.despawn(gone).unwrap();

        let result = scene.spawn(SceneEntity::new(Transform::default()).with_parent(gone));
        assert_eq!(result, Err(SceneError::NoSuchEntity(gone)));
    }

    #[test]
    fn set_parent_rejects_cycles() {
        let mut scene = Scene::new();
        let a = node(&mut scene, Transform::default(), None);
        let b = node(&mut scene, Transform::default(), Some(a));
        let c = node(&mut scene, Transform::default(), Some(b));

        assert_eq!(
            scene.set_parent(a, Some(c)),
            Err(SceneError::Cycle { child: a, parent: c })
        );
        assert_eq!(
            scene.set_parent(a, Some(a)),
            Err(SceneError::Cycle { child: a, parent: a })
        );

        // Moving c up to a is fine, as is detaching b.
        scene.set_parent(c, Some(a)).unwrap();
        scene.set_parent(b, None).unwrap();
        assert_eq!(scene.roots(), vec![a, b]);
        assert_eq!(scene.children(a), vec![c]);
    }

    #[test]
    fn despawn_refuses_while_children_remain() {
        let mut scene = Scene::new();
        let parent = node(&mut scene, Transform::default(), None);
        let child = node(&mut scene, Transform::default(), Some(parent));

        assert_eq!(scene.despawn(parent), Err(SceneError::HasChildren(parent)));

        scene.despawn(child).unwrap();
        scene.despawn(parent).unwrap();
        assert!(scene.roots().is_empty());
    }

    #[test]
    fn stale_parent_is_reported() {
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::new();
        let parent = node(&mut scene, Transform::default(), None);
        let child = scene
            .spawn(
                SceneEntity::new(Transform::default())
                    .with_mesh(cube(&mut backend, 1.0))
                    .with_parent(parent),
            )
            .unwrap();

        scene.world_mut().despawn(parent).unwrap();

        let stale = SceneError::StaleParent { child, parent };
        assert_eq!(scene.world_transform(child), Err(stale.clone()));

        let bindings = AttributeBindings::standard();
        backend.clear();
        let mut ctx = RenderContext::new(&mut backend, UNIFORMS, &bindings);
        assert_eq!(scene.draw_all(Mat4::IDENTITY, &mut ctx), Err(stale));
        assert_eq!(backend.draws().count(), 0);
    }

    #[test]
    fn cycles_made_behind_the_scenes_terminate() {
        let mut backend = RecordingBackend::new();
        let mut scene = Scene::new();
        let a = node(&mut scene, Transform::default(), None);
        let b = node(&mut scene, Transform::default(), Some(a));
        scene.world_mut().insert_one(a, Parent(b)).unwrap();

        assert!(matches!(scene.world_transform(b), Err(SceneError::Cycle { .. })));

        let bindings = AttributeBindings::standard();
        let mut ctx = RenderContext::new(&mut backend, UNIFORMS, &bindings);
        assert!(matches!(
            scene.draw_all(Mat4::IDENTITY, &mut ctx),
            Err(SceneError::Cycle { .. })
        ));
    }

    #[test]
    fn missing_entity_errors() {
        let mut scene = Scene::new();
        let e = node(&mut scene, Transform::default(), None);
        scene.despawn(e).unwrap();

        assert_eq!(scene.transform(e), Err(SceneError::NoSuchEntity(e)));
        assert_eq!(scene.world_transform(e), Err(SceneError::NoSuchEntity(e)));
        assert_eq!(scene.despawn(e), Err(SceneError::NoSuchEntity(e)));
    }
}
