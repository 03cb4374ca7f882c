//! Shading strategies and the render context they read from.
//!
//! The shader set is closed and known at design time, so strategies are a
//! tagged enum dispatched by [`BoundShader`] rather than trait objects.
//! All shared lookup state (texture units, lights, viewer position,
//! exposure) lives in an explicit [`RenderContext`] owned by the renderer
//! and passed by reference into shader invocations; shaders never mutate
//! it.

use crate::light::Light;
use crate::math::{Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::render::vertex::{FragmentAttributes, VertexAttributes};
use crate::texture::Texture;

/// Sentinel handle for "no texture / no light bound".
pub const UNBOUND: i32 = -1;

/// Shared read-only state for one renderer instance.
///
/// Registries are append-only: handles are indices and stay valid for the
/// lifetime of the context. Lookups with invalid handles degrade to
/// neutral results instead of failing the draw.
pub struct RenderContext {
    textures: Vec<Texture>,
    lights: Vec<Light>,
    pub viewer_pos: Vec3,
    pub exposure: f32,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            textures: Vec::new(),
            lights: Vec::new(),
            viewer_pos: Vec3::ZERO,
            exposure: 1.0,
        }
    }

    /// Register a texture, returning its handle.
    pub fn add_texture(&mut self, texture: Texture) -> i32 {
        self.textures.push(texture);
        self.textures.len() as i32 - 1
    }

    pub fn texture(&self, handle: i32) -> Option<&Texture> {
        usize::try_from(handle).ok().and_then(|i| self.textures.get(i))
    }

    /// Register a light source, returning its handle.
    pub fn add_light(&mut self, light: Light) -> i32 {
        self.lights.push(light);
        self.lights.len() as i32 - 1
    }

    pub fn light(&self, handle: i32) -> Option<&Light> {
        usize::try_from(handle).ok().and_then(|i| self.lights.get(i))
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Sample a texture unit with screen-space UV derivatives for mip
    /// selection. An unbound or invalid handle yields zero.
    pub fn sample_texture(&self, handle: i32, uv: Vec2, duv_dx: Vec2, duv_dy: Vec2) -> Vec4 {
        let Some(texture) = self.texture(handle) else {
            return Vec4::ZERO;
        };
        if texture.has_mipmaps() {
            let texel_scale = Vec2::new(texture.width() as f32, texture.height() as f32);
            let dfdx = duv_dx * texel_scale;
            let dfdy = duv_dy * texel_scale;
            // LOD = 0.5 * log2 of the larger squared derivative magnitude.
            let footprint = dfdx.dot(dfdx).max(dfdy.dot(dfdy));
            texture.sample_lod(uv, (0.5 * footprint.log2()).max(0.0))
        } else {
            texture.sample(uv)
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The closed set of shading strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ShadingModel {
    /// Positions are already in clip space; fragments visualize UVs.
    Passthrough,
    /// Emission color or diffuse texture, no lighting.
    #[default]
    Unlit,
    /// Phong reflection (reflected-ray specular).
    Phong,
    /// Blinn-Phong reflection (halfway-vector specular).
    BlinnPhong,
    /// Blinn-Phong with a tangent-space normal map.
    NormalMapped,
    /// Unlit texture with material transparency, for blended geometry.
    AlphaBlend,
}

/// Per-draw material parameters consumed by the strategies.
#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub model: ShadingModel,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub emission: Vec3,
    pub shininess: f32,
    pub transparency: f32,
    pub diffuse_texture: i32,
    pub specular_texture: i32,
    pub normal_texture: i32,
    pub glow_texture: i32,
    pub lighting: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            model: ShadingModel::default(),
            ambient: Vec3::ZERO,
            diffuse: Vec3::ONE,
            specular: Vec3::ZERO,
            emission: Vec3::ZERO,
            shininess: 1.0,
            transparency: 1.0,
            diffuse_texture: UNBOUND,
            specular_texture: UNBOUND,
            normal_texture: UNBOUND,
            glow_texture: UNBOUND,
            lighting: true,
        }
    }
}

/// A material bound to the matrices of one draw call.
///
/// `vertex` is invoked exactly three times per triangle by the geometry
/// stage; `fragment` once per non-sentinel fragment by the shading stage.
/// Both are pure with respect to shared state.
pub struct BoundShader {
    material: Material,
    model_matrix: Mat4,
    normal_matrix: Mat3,
    view_proj: Mat4,
}

impl BoundShader {
    pub fn new(material: Material, model_matrix: Mat4, view_proj: Mat4) -> Self {
        Self {
            material,
            model_matrix,
            normal_matrix: Mat3::normal_from(&model_matrix),
            view_proj,
        }
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Transform one vertex into world and clip space.
    pub fn vertex(&self, v: &mut VertexAttributes) {
        if self.material.model == ShadingModel::Passthrough {
            v.clip_pos = Vec4::from_vec3(v.world_pos, 1.0);
            return;
        }

        v.world_pos = (self.model_matrix * Vec4::from_vec3(v.world_pos, 1.0)).to_vec3();
        v.normal = (self.normal_matrix * v.normal).normalize();
        v.clip_pos = self.view_proj * Vec4::from_vec3(v.world_pos, 1.0);

        if self.material.model == ShadingModel::NormalMapped {
            let tangent = (self.normal_matrix * v.tbn.column(0)).normalize();
            let bitangent = (self.normal_matrix * v.tbn.column(1)).normalize();
            v.tbn = Mat3::from_columns(tangent, bitangent, v.normal);
            v.interpolate_tbn = true;
        }
    }

    /// Shade one fragment, returning RGBA.
    pub fn fragment(
        &self,
        ctx: &RenderContext,
        frag: &FragmentAttributes,
        duv_dx: Vec2,
        duv_dy: Vec2,
    ) -> Vec4 {
        match self.material.model {
            ShadingModel::Passthrough => {
                Vec4::new(frag.texcoord.x, frag.texcoord.y, 0.0, 1.0)
            }
            ShadingModel::Unlit | ShadingModel::AlphaBlend => {
                let mut color = Vec4::from_vec3(self.material.emission, 1.0);
                if self.material.diffuse_texture != UNBOUND {
                    color =
                        ctx.sample_texture(self.material.diffuse_texture, frag.texcoord, duv_dx, duv_dy);
                }
                if self.material.model == ShadingModel::AlphaBlend {
                    color.w *= self.material.transparency;
                }
                color
            }
            ShadingModel::Phong => self.shade_lit(ctx, frag, duv_dx, duv_dy, frag.normal, false),
            ShadingModel::BlinnPhong => {
                self.shade_lit(ctx, frag, duv_dx, duv_dy, frag.normal, true)
            }
            ShadingModel::NormalMapped => {
                let mut normal = frag.normal;
                if self.material.normal_texture != UNBOUND {
                    let sampled = ctx
                        .sample_texture(self.material.normal_texture, frag.texcoord, duv_dx, duv_dy)
                        .to_vec3();
                    normal = frag.tbn * (sampled * 2.0 - Vec3::ONE);
                }
                self.shade_lit(ctx, frag, duv_dx, duv_dy, normal, true)
            }
        }
    }

    /// Shared lighting loop for the Phong-family strategies.
    fn shade_lit(
        &self,
        ctx: &RenderContext,
        frag: &FragmentAttributes,
        duv_dx: Vec2,
        duv_dy: Vec2,
        normal: Vec3,
        halfway_specular: bool,
    ) -> Vec4 {
        let m = &self.material;
        let diffuse_texel = if m.diffuse_texture != UNBOUND {
            ctx.sample_texture(m.diffuse_texture, frag.texcoord, duv_dx, duv_dy)
        } else {
            Vec4::ONE
        };
        let albedo = if m.diffuse_texture != UNBOUND {
            diffuse_texel.to_vec3()
        } else {
            m.diffuse
        };
        let specular = if m.specular_texture != UNBOUND {
            ctx.sample_texture(m.specular_texture, frag.texcoord, duv_dx, duv_dy)
                .to_vec3()
        } else {
            m.specular
        };
        let emission = if m.glow_texture != UNBOUND {
            ctx.sample_texture(m.glow_texture, frag.texcoord, duv_dx, duv_dy)
                .to_vec3()
        } else {
            m.emission
        };

        let alpha = diffuse_texel.w * m.transparency;
        if !m.lighting {
            return Vec4::from_vec3(emission, alpha);
        }

        let normal = normal.normalize();
        let view_dir = (ctx.viewer_pos - frag.world_pos).normalize();
        let mut color = Vec3::ZERO;
        for light in ctx.lights() {
            let light_dir = light.direction(frag.world_pos);
            let ambient = light.intensity() * albedo * m.ambient;
            let diff_cos = normal.dot(light_dir).max(0.0);
            let diffuse = light.intensity() * albedo * diff_cos;
            let spec_cos = if halfway_specular {
                let halfway = (view_dir + light_dir).normalize();
                halfway.dot(normal).max(0.0)
            } else {
                let reflected = (-light_dir).reflect(normal);
                view_dir.dot(reflected).max(0.0)
            };
            let spec = light.intensity() * specular * spec_cos.powf(m.shininess);
            let attenuation = light.attenuation(frag.world_pos);
            let cutoff = light.cutoff(light_dir);
            color = color + (ambient + diffuse + spec) * (attenuation * cutoff);
        }
        color = color + emission;

        // Exposure tone mapping keeps bright specular sums in range.
        let tone_mapped = Vec3::new(
            1.0 - (-color.x * ctx.exposure).exp(),
            1.0 - (-color.y * ctx.exposure).exp(),
            1.0 - (-color.z * ctx.exposure).exp(),
        );
        Vec4::from_vec3(tone_mapped, alpha)
    }
}
