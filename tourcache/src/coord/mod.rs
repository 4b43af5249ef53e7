//! Geographic location keys
//!
//! A [`LocationKey`] identifies the collection of cached entries fetched for
//! one map pin. Keys are validated latitude/longitude pairs and compare
//! exactly, so the same pin always maps to the same collection.

mod types;

pub use types::{CoordError, LocationKey, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_london_is_valid() {
        let key = LocationKey::new(51.5, -0.12).unwrap();
        assert_eq!(key.latitude(), 51.5);
        assert_eq!(key.longitude(), -0.12);
    }

    #[test]
    fn test_poles_and_antimeridian_are_valid() {
        assert!(LocationKey::new(MAX_LAT, MAX_LON).is_ok());
        assert!(LocationKey::new(MIN_LAT, MIN_LON).is_ok());
    }

    #[test]
    fn test_latitude_out_of_range() {
        let result = LocationKey::new(90.5, 0.0);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(lat)) if lat == 90.5));
    }

    #[test]
    fn test_longitude_out_of_range() {
        let result = LocationKey::new(0.0, -180.01);
        assert!(matches!(result, Err(CoordError::InvalidLongitude(_))));
    }

    #[test]
    fn test_nan_rejected() {
        assert!(LocationKey::new(f64::NAN, 0.0).is_err());
        assert!(LocationKey::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        let a = LocationKey::new(-0.0, 10.0).unwrap();
        let b = LocationKey::new(0.0, 10.0).unwrap();
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_display() {
        let key = LocationKey::new(51.5, -0.12).unwrap();
        assert_eq!(key.to_string(), "(51.5, -0.12)");
    }

    #[test]
    fn test_parse_comma_separated() {
        let key: LocationKey = "51.5,-0.12".parse().unwrap();
        assert_eq!(key, LocationKey::new(51.5, -0.12).unwrap());

        let spaced: LocationKey = " 48.85 , 2.35 ".parse().unwrap();
        assert_eq!(spaced, LocationKey::new(48.85, 2.35).unwrap());
    }

    #[test]
    fn test_parse_display_form() {
        let key: LocationKey = "(51.5, -0.12)".parse().unwrap();
        assert_eq!(key, LocationKey::new(51.5, -0.12).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "51.5".parse::<LocationKey>(),
            Err(CoordError::Parse(_))
        ));
        assert!(matches!(
            "north,west".parse::<LocationKey>(),
            Err(CoordError::Parse(_))
        ));
        assert!(matches!(
            "95.0,0.0".parse::<LocationKey>(),
            Err(CoordError::InvalidLatitude(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_valid_coordinates_round_trip_through_display(
            lat in MIN_LAT..=MAX_LAT,
            lon in MIN_LON..=MAX_LON,
        ) {
            let key = LocationKey::new(lat, lon).unwrap();
            let parsed: LocationKey = key.to_string().parse().unwrap();
            prop_assert_eq!(parsed, key);
        }

        #[test]
        fn prop_out_of_range_latitude_rejected(lat in 90.000_001f64..1000.0) {
            prop_assert!(LocationKey::new(lat, 0.0).is_err());
            prop_assert!(LocationKey::new(-lat, 0.0).is_err());
        }
    }
}
