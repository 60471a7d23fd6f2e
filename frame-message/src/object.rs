use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;

/// Rotated bounding box, center based.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RBBox {
    pub xc: f32,
    pub yc: f32,
    pub width: f32,
    pub height: f32,
    pub angle: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoObject {
    pub id: i64,
    /// Name of the model that produced the object.
    pub namespace: String,
    pub label: String,
    pub detection_box: RBBox,
    pub confidence: Option<f32>,
    pub attributes: Vec<Attribute>,
    pub parent_id: Option<i64>,
}
