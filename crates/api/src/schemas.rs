use iot_core::error::ApiResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::{body_object, require_number_in, require_object, require_str, trimmed_text, FromBody};

pub const PROMPT_MAX_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Trimmed, 1 to 2000 characters.
    pub prompt: String,
}

impl FromBody for ChatRequest {
    fn from_body(body: &Value) -> ApiResult<Self> {
        let obj = body_object(body)?;
        let prompt = trimmed_text(require_str(obj, "prompt")?, "prompt", PROMPT_MAX_CHARS)?;
        Ok(Self { prompt })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    fn from_field(obj: &Map<String, Value>, path: &str) -> ApiResult<Self> {
        let point = require_object(obj, path)?;
        Ok(Self {
            lng: require_number_in(point, &format!("{path}.lng"), -180.0, 180.0)?,
            lat: require_number_in(point, &format!("{path}.lat"), -90.0, 90.0)?,
        })
    }

    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0088;
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteOptionsRequest {
    pub from: GeoPoint,
    pub to: GeoPoint,
}

impl FromBody for RouteOptionsRequest {
    fn from_body(body: &Value) -> ApiResult<Self> {
        let obj = body_object(body)?;
        Ok(Self { from: GeoPoint::from_field(obj, "from")?, to: GeoPoint::from_field(obj, "to")? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOption {
    pub id: String,
    pub eta_mins: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOptionsResponse {
    pub options: Vec<RouteOption>,
}
