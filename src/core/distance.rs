/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Great-circle distance between two optional positions
///
/// Returns `None` when any coordinate is missing, non-finite or outside the
/// valid latitude/longitude range.
pub fn distance_km(
    lat1: Option<f64>,
    lon1: Option<f64>,
    lat2: Option<f64>,
    lon2: Option<f64>,
) -> Option<f64> {
    let lat1 = valid_latitude(lat1?)?;
    let lon1 = valid_longitude(lon1?)?;
    let lat2 = valid_latitude(lat2?)?;
    let lon2 = valid_longitude(lon2?)?;

    Some(haversine_distance(lat1, lon1, lat2, lon2))
}

#[inline]
fn valid_latitude(lat: f64) -> Option<f64> {
    (lat.is_finite() && (-90.0..=90.0).contains(&lat)).then_some(lat)
}

#[inline]
fn valid_longitude(lon: f64) -> Option<f64> {
    (lon.is_finite() && (-180.0..=180.0).contains(&lon)).then_some(lon)
}
