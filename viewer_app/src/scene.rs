//! Procedural scene content: a vertex-colored cube over a checkered floor

use subpass_renderer::prelude::*;

const CUBE_HALF_EXTENT: f32 = 1.0;
const FLOOR_HALF_EXTENT: f32 = 4.0;
const FLOOR_HEIGHT: f32 = -1.2;
const FLOOR_UV_REPEAT: f32 = 4.0;

/// Quad centred at `center` facing `u × v`, wound counter-clockwise when
/// seen from the front
fn quad(
    center: [f32; 3],
    u: [f32; 3],
    v: [f32; 3],
    color: [f32; 3],
    uv_scale: f32,
    base: u32,
) -> ([Vertex; 4], [u32; 6]) {
    let corner = |su: f32, sv: f32, tex: [f32; 2]| Vertex {
        position: [
            center[0] + su * u[0] + sv * v[0],
            center[1] + su * u[1] + sv * v[1],
            center[2] + su * u[2] + sv * v[2],
        ],
        color,
        tex_coord: tex,
    };

    (
        [
            corner(-1.0, -1.0, [0.0, uv_scale]),
            corner(1.0, -1.0, [uv_scale, uv_scale]),
            corner(1.0, 1.0, [uv_scale, 0.0]),
            corner(-1.0, 1.0, [0.0, 0.0]),
        ],
        [base, base + 1, base + 2, base, base + 2, base + 3],
    )
}

fn scale(v: [f32; 3], s: f32) -> [f32; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Unit cube with one color per face, using the default texture
pub fn cube() -> MeshData {
    const X: [f32; 3] = [1.0, 0.0, 0.0];
    const Y: [f32; 3] = [0.0, 1.0, 0.0];
    const Z: [f32; 3] = [0.0, 0.0, 1.0];
    let neg = |v: [f32; 3]| scale(v, -1.0);

    // (normal, u, v) with u × v == normal
    let faces = [
        (X, Y, Z, [0.9, 0.2, 0.2]),
        (neg(X), Z, Y, [0.2, 0.9, 0.9]),
        (Y, Z, X, [0.2, 0.9, 0.2]),
        (neg(Y), X, Z, [0.9, 0.2, 0.9]),
        (Z, X, Y, [0.2, 0.2, 0.9]),
        (neg(Z), Y, X, [0.9, 0.9, 0.2]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v, color) in faces {
        let base = vertices.len() as u32;
        let (quad_vertices, quad_indices) = quad(
            scale(normal, CUBE_HALF_EXTENT),
            scale(u, CUBE_HALF_EXTENT),
            scale(v, CUBE_HALF_EXTENT),
            color,
            1.0,
            base,
        );
        vertices.extend_from_slice(&quad_vertices);
        indices.extend_from_slice(&quad_indices);
    }

    MeshData::new(vertices, indices)
}

/// Floor quad below the cube sampling `texture`
pub fn floor(texture: TextureId) -> MeshData {
    let (vertices, indices) = quad(
        [0.0, 0.0, FLOOR_HEIGHT],
        [FLOOR_HALF_EXTENT, 0.0, 0.0],
        [0.0, FLOOR_HALF_EXTENT, 0.0],
        [1.0, 1.0, 1.0],
        FLOOR_UV_REPEAT,
        0,
    );
    MeshData::new(vertices.to_vec(), indices.to_vec()).with_texture(MeshTexture::Id(texture))
}

/// Two-tone checkerboard of `size`×`size` pixels with `cells` cells per side
pub fn checkerboard(size: u32, cells: u32) -> VulkanResult<TextureData> {
    let cell = (size / cells.max(1)).max(1);
    let pixels = (0..size)
        .flat_map(|y| (0..size).map(move |x| (x, y)))
        .flat_map(|(x, y)| {
            if (x / cell + y / cell) % 2 == 0 {
                [220, 220, 210, 255]
            } else {
                [60, 70, 60, 255]
            }
        })
        .collect();
    TextureData::new(size, size, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    #[test]
    fn test_cube_is_valid() {
        let cube = cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn test_cube_faces_wind_outward() {
        let cube = cube();
        for triangle in cube.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| cube.vertices[triangle[i] as usize].position);
            let normal = cross(sub(b, a), sub(c, a));
            let centroid = [
                (a[0] + b[0] + c[0]) / 3.0,
                (a[1] + b[1] + c[1]) / 3.0,
                (a[2] + b[2] + c[2]) / 3.0,
            ];
            assert!(dot(normal, centroid) > 0.0, "triangle {triangle:?} faces inward");
        }
    }

    #[test]
    fn test_floor_faces_up() {
        let floor = floor(TextureId::DEFAULT);
        assert!(floor.validate().is_ok());
        let [a, b, c] = [0, 1, 2].map(|i| floor.vertices[floor.indices[i] as usize].position);
        assert!(cross(sub(b, a), sub(c, a))[2] > 0.0);
        assert!(matches!(floor.texture, MeshTexture::Id(_)));
    }

    #[test]
    fn test_checkerboard_alternates() {
        let texture = checkerboard(16, 4).unwrap();
        assert_eq!(texture.pixels().len(), 16 * 16 * 4);
        let pixel = |x: usize, y: usize| &texture.pixels()[(y * 16 + x) * 4..(y * 16 + x) * 4 + 4];
        assert_ne!(pixel(0, 0), pixel(4, 0));
        assert_eq!(pixel(0, 0), pixel(4, 4));
    }
}
