//! Uniform values as a closed set of shapes.

use std::collections::BTreeMap;

use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};

/// Scalar type of a uniform's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float,
    Int,
    UInt,
}

/// A value that can be assigned to a shader uniform.
///
/// Arrays hold elements of one shape; structs map member names to values
/// and may omit members that should keep their current value.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
    Int(i32),
    IVec2(IVec2),
    IVec3(IVec3),
    IVec4(IVec4),
    UInt(u32),
    UVec2(UVec2),
    UVec3(UVec3),
    UVec4(UVec4),
    Bool(bool),
    Array(Vec<UniformValue>),
    Struct(BTreeMap<String, UniformValue>),
}

impl UniformValue {
    /// Builds a struct value from `(member, value)` pairs.
    pub fn structure<K: Into<String>>(members: impl IntoIterator<Item = (K, UniformValue)>) -> Self {
        UniformValue::Struct(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Scalar type of the leaf components. `None` for structs and empty arrays.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            UniformValue::Float(_)
            | UniformValue::Vec2(_)
            | UniformValue::Vec3(_)
            | UniformValue::Vec4(_)
            | UniformValue::Mat2(_)
            | UniformValue::Mat3(_)
            | UniformValue::Mat4(_) => Some(ScalarKind::Float),
            UniformValue::Int(_)
            | UniformValue::IVec2(_)
            | UniformValue::IVec3(_)
            | UniformValue::IVec4(_)
            | UniformValue::Bool(_) => Some(ScalarKind::Int),
            UniformValue::UInt(_)
            | UniformValue::UVec2(_)
            | UniformValue::UVec3(_)
            | UniformValue::UVec4(_) => Some(ScalarKind::UInt),
            UniformValue::Array(items) => items.first().and_then(UniformValue::scalar_kind),
            UniformValue::Struct(_) => None,
        }
    }

    /// Appends float components in column-major order.
    ///
    /// Returns `false` without writing anything if any part of the value is
    /// not float-typed.
    pub fn write_f32(&self, out: &mut Vec<f32>) -> bool {
        match self {
            UniformValue::Float(v) => out.push(*v),
            UniformValue::Vec2(v) => out.extend_from_slice(&v.to_array()),
            UniformValue::Vec3(v) => out.extend_from_slice(&v.to_array()),
            UniformValue::Vec4(v) => out.extend_from_slice(&v.to_array()),
            UniformValue::Mat2(m) => out.extend_from_slice(&m.to_cols_array()),
            UniformValue::Mat3(m) => out.extend_from_slice(&m.to_cols_array()),
            UniformValue::Mat4(m) => out.extend_from_slice(&m.to_cols_array()),
            UniformValue::Array(items) => {
                let start = out.len();
                if !items.iter().all(|item| item.write_f32(out)) {
                    out.truncate(start);
                    return false;
                }
            }
            _ => return false,
        }
        true
    }

    /// Appends signed integer components. Booleans become 0 or 1.
    pub fn write_i32(&self, out: &mut Vec<i32>) -> bool {
        match self {
            UniformValue::Int(v) => out.push(*v),
            UniformValue::Bool(v) => out.push(i32::from(*v)),
            UniformValue::IVec2(v) => out.extend_from_slice(&v.to_array()),
            UniformValue::IVec3(v) => out.extend_from_slice(&v.to_array()),
            UniformValue::IVec4(v) => out.extend_from_slice(&v.to_array()),
            UniformValue::Array(items) => {
                let start = out.len();
                if !items.iter().all(|item| item.write_i32(out)) {
                    out.truncate(start);
                    return false;
                }
            }
            _ => return false,
        }
        true
    }

    /// Appends unsigned integer components.
    pub fn write_u32(&self, out: &mut Vec<u32>) -> bool {
        match self {
            UniformValue::UInt(v) => out.push(*v),
            UniformValue::UVec2(v) => out.extend_from_slice(&v.to_array()),
            UniformValue::UVec3(v) => out.extend_from_slice(&v.to_array()),
            UniformValue::UVec4(v) => out.extend_from_slice(&v.to_array()),
            UniformValue::Array(items) => {
                let start = out.len();
                if !items.iter().all(|item| item.write_u32(out)) {
                    out.truncate(start);
                    return false;
                }
            }
            _ => return false,
        }
        true
    }

    /// Member of a struct value.
    pub fn member(&self, name: &str) -> Option<&UniformValue> {
        match self {
            UniformValue::Struct(members) => members.get(name),
            _ => None,
        }
    }

    /// Element of an array value.
    pub fn element(&self, index: usize) -> Option<&UniformValue> {
        match self {
            UniformValue::Array(items) => items.get(index),
            _ => None,
        }
    }
}

macro_rules! impl_from_uniform {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    UniformValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_uniform! {
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat2 => Mat2,
    Mat3 => Mat3,
    Mat4 => Mat4,
    i32 => Int,
    IVec2 => IVec2,
    IVec3 => IVec3,
    IVec4 => IVec4,
    u32 => UInt,
    UVec2 => UVec2,
    UVec3 => UVec3,
    UVec4 => UVec4,
    bool => Bool,
}

impl<T: Into<UniformValue>> From<Vec<T>> for UniformValue {
    fn from(values: Vec<T>) -> Self {
        UniformValue::Array(values.into_iter().map(Into::into).collect())
    }
}
