//! 3x4 affine joint matrices.
//!
//! Joint transforms are stored as 3 rows x 4 columns in column-major order,
//! the same layout the pose vector uses for per-joint local transforms. The
//! implicit fourth row is `[0, 0, 0, 1]`.
//!
//! Memory layout (48 bytes):
//! ```text
//! cols[0..3] - rotation/scale columns
//! cols[3]    - translation
//! ```

use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Mat3, Vec3};

/// 3x4 affine joint matrix (column-major storage, POD type).
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct JointMatrix {
    /// Four columns of three rows each; the last column is the translation.
    pub cols: [[f32; 3]; 4],
}

impl JointMatrix {
    /// Identity joint matrix (no transformation).
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
        ],
    };

    /// Create from column arrays.
    pub const fn from_cols(cols: [[f32; 3]; 4]) -> Self {
        Self { cols }
    }

    /// Create from a flat f32 array in column-major order.
    pub fn from_cols_array(arr: &[f32; 12]) -> Self {
        Self {
            cols: [
                [arr[0], arr[1], arr[2]],
                [arr[3], arr[4], arr[5]],
                [arr[6], arr[7], arr[8]],
                [arr[9], arr[10], arr[11]],
            ],
        }
    }

    /// Flatten to column-major f32 array (the pose-vector layout).
    pub fn to_cols_array(&self) -> [f32; 12] {
        [
            self.cols[0][0],
            self.cols[0][1],
            self.cols[0][2],
            self.cols[1][0],
            self.cols[1][1],
            self.cols[1][2],
            self.cols[2][0],
            self.cols[2][1],
            self.cols[2][2],
            self.cols[3][0],
            self.cols[3][1],
            self.cols[3][2],
        ]
    }

    /// Convert to a glam affine transform.
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_mat3_translation(
            Mat3::from_cols(
                Vec3::from_array(self.cols[0]),
                Vec3::from_array(self.cols[1]),
                Vec3::from_array(self.cols[2]),
            ),
            Vec3::from_array(self.cols[3]),
        )
    }

    /// Convert from a glam affine transform, truncating to 3x4.
    pub fn from_affine(affine: &Affine3A) -> Self {
        let m = affine.matrix3;
        Self {
            cols: [
                m.x_axis.to_array(),
                m.y_axis.to_array(),
                m.z_axis.to_array(),
                affine.translation.to_array(),
            ],
        }
    }

    /// Apply to a point: rotation/scale part times `p`, plus translation.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        Vec3::from_array(self.cols[0]) * p.x
            + Vec3::from_array(self.cols[1]) * p.y
            + Vec3::from_array(self.cols[2]) * p.z
            + Vec3::from_array(self.cols[3])
    }

    /// Mirror the transform across the YZ plane (`S * M * S` with
    /// `S = diag(-1, 1, 1)`, translation x negated).
    ///
    /// Converts between the conventional left-handed skeletal input and the
    /// engine's right-handed pose convention. Applied once at the pose
    /// boundary, never inside the pipeline.
    pub fn flip_handedness(&self) -> Self {
        let mut out = *self;
        out.cols[0][1] = -out.cols[0][1];
        out.cols[0][2] = -out.cols[0][2];
        out.cols[1][0] = -out.cols[1][0];
        out.cols[2][0] = -out.cols[2][0];
        out.cols[3][0] = -out.cols[3][0];
        out
    }
}
