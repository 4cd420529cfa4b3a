//! Query point resolution: the home zone first, then any configured extras.

use serde_json::Value;

use crate::error::UpdateFailed;
use crate::types::{GeoPoint, ZoneState};

/// Entity id of the anchor zone.
pub const HOME_ZONE: &str = "zone.home";

/// Parse `"lat1,lon1;lat2,lon2"` into points.
///
/// Segments that are empty, do not have exactly two parts, or hold a part that
/// is not a float are skipped.
pub fn parse_extra_coords(text: &str) -> Vec<GeoPoint> {
    text.split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| {
            let parts: Vec<&str> = segment.split(',').collect();
            let [lat, lon] = parts.as_slice() else {
                return None;
            };
            let latitude = lat.trim().parse::<f64>().ok()?;
            let longitude = lon.trim().parse::<f64>().ok()?;
            Some(GeoPoint::new(latitude, longitude))
        })
        .collect()
}

/// Read the anchor point from the home zone's attributes.
pub fn anchor_point(zone: Option<&ZoneState>) -> Result<GeoPoint, UpdateFailed> {
    let zone = zone.ok_or(UpdateFailed::ZoneNotFound)?;

    let (Some(latitude), Some(longitude)) = (zone.attribute("latitude"), zone.attribute("longitude"))
    else {
        return Err(UpdateFailed::MissingCoordinates);
    };

    match (coerce_f64(latitude), coerce_f64(longitude)) {
        (Some(latitude), Some(longitude)) => Ok(GeoPoint::new(latitude, longitude)),
        _ => Err(UpdateFailed::InvalidCoordinates),
    }
}

/// All points to query this cycle, anchor first.
pub fn resolve_points(zone: Option<&ZoneState>, extra_coords: &str) -> Result<Vec<GeoPoint>, UpdateFailed> {
    let mut points = vec![anchor_point(zone)?];
    points.extend(parse_extra_coords(extra_coords));

    // Unreachable while the anchor is mandatory; kept in case that changes.
    if points.is_empty() {
        return Err(UpdateFailed::NoCoordinates);
    }
    Ok(points)
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}
