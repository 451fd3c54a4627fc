//! WGS84 to UTM forward projection.
//!
//! Every stored geometry is reprojected to one fixed local UTM zone
//! before load. This module implements the standard WGS84 transverse
//! Mercator forward series (Snyder); nothing in the pipeline needs the
//! inverse.

use anyhow::{bail, Result};
use geo::MapCoords;
use geo_types::{Coord, Geometry};

/// EPSG code of the fixed target projection (UTM zone 19S).
pub const TARGET_EPSG: u32 = 32719;

// WGS84 ellipsoid
const R: f64 = 6_378_137.0;
const E: f64 = 0.006_694_38;
const K0: f64 = 0.9996;

/// Forward UTM projection for a single zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmProjection {
    zone: u8,
    south: bool,
}

impl UtmProjection {
    /// Build a projection from a UTM EPSG code (326xx north, 327xx south).
    pub fn from_epsg(code: u32) -> Result<Self> {
        let zone = (code % 100) as u8;
        if !(1..=60).contains(&zone) {
            bail!("EPSG:{} does not name a UTM zone", code);
        }
        match code / 100 {
            326 => Ok(Self { zone, south: false }),
            327 => Ok(Self { zone, south: true }),
            _ => bail!("EPSG:{} is not a UTM code", code),
        }
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }

    pub fn is_south(&self) -> bool {
        self.south
    }

    /// Central meridian of the zone, degrees.
    fn central_meridian(&self) -> f64 {
        f64::from(self.zone - 1) * 6.0 - 180.0 + 3.0
    }

    /// Project one WGS84 lon/lat coordinate to easting/northing meters.
    pub fn project(&self, coord: Coord<f64>) -> Coord<f64> {
        let lat = coord.y.to_radians();
        let lon = coord.x.to_radians();
        let central = self.central_meridian().to_radians();

        let e2 = E * E;
        let e3 = e2 * E;
        let ep2 = E / (1.0 - E);

        let m1 = 1.0 - E / 4.0 - 3.0 * e2 / 64.0 - 5.0 * e3 / 256.0;
        let m2 = 3.0 * E / 8.0 + 3.0 * e2 / 32.0 + 45.0 * e3 / 1024.0;
        let m3 = 15.0 * e2 / 256.0 + 45.0 * e3 / 1024.0;
        let m4 = 35.0 * e3 / 3072.0;

        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let tan_lat = lat.tan();

        let n = R / (1.0 - E * sin_lat * sin_lat).sqrt();
        let t = tan_lat * tan_lat;
        let c = ep2 * cos_lat * cos_lat;
        let a = cos_lat * (lon - central);

        let m = R
            * (m1 * lat - m2 * (2.0 * lat).sin() + m3 * (4.0 * lat).sin()
                - m4 * (6.0 * lat).sin());

        let easting = K0
            * n
            * (a + a.powi(3) / 6.0 * (1.0 - t + c)
                + a.powi(5) / 120.0 * (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2))
            + 500_000.0;

        let mut northing = K0
            * (m + n
                * tan_lat
                * (a * a / 2.0
                    + a.powi(4) / 24.0 * (5.0 - t + 9.0 * c + 4.0 * c * c)
                    + a.powi(6) / 720.0 * (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2)));
        if self.south {
            northing += 10_000_000.0;
        }

        Coord {
            x: easting,
            y: northing,
        }
    }

    /// Project every coordinate of a geometry.
    pub fn project_geometry(&self, geometry: &Geometry<f64>) -> Geometry<f64> {
        geometry.map_coords(|c| self.project(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{LineString, Point};

    #[test]
    fn test_from_epsg() {
        let p = UtmProjection::from_epsg(TARGET_EPSG).unwrap();
        assert_eq!(p.zone(), 19);
        assert!(p.is_south());

        let p = UtmProjection::from_epsg(32632).unwrap();
        assert_eq!(p.zone(), 32);
        assert!(!p.is_south());

        assert!(UtmProjection::from_epsg(4326).is_err());
        assert!(UtmProjection::from_epsg(32700).is_err());
        assert!(UtmProjection::from_epsg(32661).is_err());
    }

    #[test]
    fn test_zone_19_central_meridian() {
        let p = UtmProjection::from_epsg(TARGET_EPSG).unwrap();
        assert_eq!(p.central_meridian(), -69.0);
    }

    #[test]
    fn test_known_coordinate_zone_32n() {
        // Reference values for 51.2N 7.5E in EPSG:32632
        let p = UtmProjection::from_epsg(32632).unwrap();
        let out = p.project(Coord { x: 7.5, y: 51.2 });
        assert!((out.x - 395_201.3104).abs() < 0.01, "easting {}", out.x);
        assert!((out.y - 5_673_135.2412).abs() < 0.01, "northing {}", out.y);
    }

    #[test]
    fn test_southern_false_northing() {
        let north = UtmProjection::from_epsg(32619).unwrap();
        let south = UtmProjection::from_epsg(32719).unwrap();

        let n = north.project(Coord { x: -70.5, y: 33.45 });
        let s = south.project(Coord { x: -70.5, y: -33.45 });

        // The series is odd-symmetric in latitude.
        assert!((n.x - s.x).abs() < 1e-6);
        assert!((s.y - (10_000_000.0 - n.y)).abs() < 1e-6);
    }

    #[test]
    fn test_central_chile_lands_in_range() {
        let p = UtmProjection::from_epsg(TARGET_EPSG).unwrap();
        let out = p.project(Coord {
            x: -70.8764,
            y: -33.6117,
        });
        // West of the -69 central meridian, mid-southern latitudes.
        assert!(out.x > 150_000.0 && out.x < 500_000.0, "easting {}", out.x);
        assert!(
            out.y > 6_000_000.0 && out.y < 6_500_000.0,
            "northing {}",
            out.y
        );
    }

    #[test]
    fn test_project_geometry_maps_all_coords() {
        let p = UtmProjection::from_epsg(TARGET_EPSG).unwrap();
        let ls: LineString<f64> = vec![(-70.9, -33.6), (-70.89, -33.61)].into();
        let projected = p.project_geometry(&Geometry::LineString(ls));
        match projected {
            Geometry::LineString(out) => {
                assert_eq!(out.0.len(), 2);
                for c in &out.0 {
                    assert!(c.x > 100_000.0);
                    assert!(c.y > 6_000_000.0);
                }
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_point_projection_is_deterministic() {
        let p = UtmProjection::from_epsg(TARGET_EPSG).unwrap();
        let a = p.project_geometry(&Geometry::Point(Point::new(-70.7, -33.5)));
        let b = p.project_geometry(&Geometry::Point(Point::new(-70.7, -33.5)));
        assert_eq!(a, b);
    }
}
