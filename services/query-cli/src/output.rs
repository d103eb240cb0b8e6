//! JSON rendering of query results.
//!
//! Non-finite values (NaN sentinels, NaN-displaced points) render as `null`.

use point_query::{Element, ResultBuffer, TransformResult};
use serde::Serialize;
use serde_json::Value;
use volume_common::ElementType;

fn typed<T: Element + Into<Value>>(result: &ResultBuffer) -> Vec<Value> {
    result
        .values::<T>()
        .unwrap_or_default()
        .into_iter()
        .map(Into::into)
        .collect()
}

fn element_values(result: &ResultBuffer) -> Vec<Value> {
    match result.element_type() {
        ElementType::UInt8 => typed::<u8>(result),
        ElementType::UInt16 => typed::<u16>(result),
        ElementType::UInt32 => typed::<u32>(result),
        ElementType::UInt64 => typed::<u64>(result),
        ElementType::Int8 => typed::<i8>(result),
        ElementType::Int16 => typed::<i16>(result),
        ElementType::Int32 => typed::<i32>(result),
        ElementType::Int64 => typed::<i64>(result),
        ElementType::Float32 => typed::<f32>(result),
        ElementType::Float64 => typed::<f64>(result),
    }
}

/// One value per point, or one array per point for multi-component data.
///
/// Integers are written exactly; 64-bit labels do not pass through `f64`.
pub fn lookup_json(result: &ResultBuffer) -> Value {
    let values = element_values(result);
    if result.width() <= 1 {
        return Value::Array(values);
    }
    Value::Array(
        values
            .chunks(result.width())
            .map(|row| Value::Array(row.to_vec()))
            .collect(),
    )
}

#[derive(Debug, Serialize)]
struct TransformRecord {
    x: f64,
    y: f64,
    z: f64,
    dx: f64,
    dy: f64,
}

/// `{x, y, z, dx, dy}` per point.
pub fn transform_json(result: &TransformResult) -> Value {
    Value::Array(
        result
            .points
            .iter()
            .zip(&result.displacements)
            .map(|(p, d)| {
                serde_json::to_value(TransformRecord {
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    dx: d.dx,
                    dy: d.dy,
                })
                .unwrap_or(Value::Null)
            })
            .collect(),
    )
}
