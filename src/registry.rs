use std::collections::HashMap;
use serde::Serialize;

/// Latitude used for turbines missing a surveyed position
pub const DEFAULT_LATITUDE: f64 = 12.12;
/// Longitude used for turbines missing a surveyed position
pub const DEFAULT_LONGITUDE: f64 = -68.9;

/// Static turbine reference data: id, display name, latitude, longitude
const TURBINES: [(i64, &str, f64, f64); 20] = [
    // Playa Kanoa
    (152, "TPK01", 12.174414, -68.856097),
    (153, "TPK02", 12.172306, -68.853696),
    (154, "TPK03", 12.170293, -68.851205),
    (155, "TPK04", 12.168005, -68.848947),
    (156, "TPK05", 12.165856, -68.846429),
    // Tera Cora
    (157, "TTC01", 12.2474125, -69.0342807),
    (158, "TTC02", 12.2446829, -69.0327308),
    (159, "TTC03", 12.2427298, -69.031011),
    (160, "TTC04", 12.2407336, -69.0299708),
    (161, "TTC05", 12.2385725, -69.0289214),
    (267, "TTC06", 12.2363767, -69.0265066),
    (268, "TTC07", 12.2342816, -69.0237002),
    (269, "TTC08", 12.2286691, -69.0175458),
    (270, "TTC09", 12.2259029, -69.0144197),
    (271, "TTC10", 12.2233604, -69.0116079),
    // Koraal Tabak
    (460, "TKT01", 12.14048, -68.8111938),
    (461, "TKT02", 12.1381709, -68.8107317),
    (462, "TKT03", 12.1359924, -68.810574),
    (463, "TKT04", 12.1339172, -68.8096241),
    (464, "TKT05", 12.1315948, -68.8091023),
];

/// Location groups; every turbine id belongs to exactly one group
const LOCATIONS: [(&str, &[i64]); 3] = [
    ("Playa Kanoa", &[152, 153, 154, 155, 156]),
    ("Tera Cora", &[157, 158, 159, 160, 161, 267, 268, 269, 270, 271]),
    ("Koraal Tabak", &[460, 461, 462, 463, 464]),
];

#[derive(Serialize, Clone, Copy, PartialEq, Debug)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Read-only turbine reference data, built once at startup and shared
/// by all request handlers
pub struct TurbineRegistry {
    ids: Vec<i64>,
    names: HashMap<i64, &'static str>,
    coordinates: HashMap<i64, Coordinates>,
    locations: Vec<(&'static str, Vec<i64>)>,
}

impl TurbineRegistry {
    pub fn new() -> Self {
        let ids = TURBINES.iter().map(|t| t.0).collect();
        let names = TURBINES.iter().map(|t| (t.0, t.1)).collect();
        let coordinates = TURBINES.iter()
            .map(|t| (t.0, Coordinates { latitude: t.2, longitude: t.3 }))
            .collect();
        let locations = LOCATIONS.iter()
            .map(|&(name, ids)| (name, ids.to_vec()))
            .collect();

        Self { ids, names, coordinates, locations }
    }

    /// All turbine ids in display order
    pub fn device_ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn display_name(&self, id: i64) -> String {
        self.names.get(&id)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("Turbine {}", id))
    }

    pub fn coordinates(&self, id: i64) -> Option<Coordinates> {
        self.coordinates.get(&id).copied()
    }

    /// Name of the location group containing the given id, empty when unknown
    pub fn location_of(&self, id: i64) -> &'static str {
        self.locations.iter()
            .find(|(_, ids)| ids.contains(&id))
            .map(|(name, _)| *name)
            .unwrap_or("")
    }

    pub fn location_ids(&self, name: &str) -> Option<&[i64]> {
        self.locations.iter()
            .find(|(loc, _)| *loc == name)
            .map(|(_, ids)| ids.as_slice())
    }

    /// The id to display name map as served to clients
    pub fn device_map(&self) -> HashMap<i64, &'static str> {
        self.names.clone()
    }

    /// The location name to id list map as served to clients
    pub fn location_groups(&self) -> Vec<(&'static str, &[i64])> {
        self.locations.iter()
            .map(|(name, ids)| (*name, ids.as_slice()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_turbine_belongs_to_exactly_one_location() {
        let registry = TurbineRegistry::new();

        for &id in registry.device_ids() {
            let memberships = LOCATIONS.iter()
                .filter(|(_, ids)| ids.contains(&id))
                .count();
            assert_eq!(memberships, 1, "turbine {} in {} groups", id, memberships);
        }
    }

    #[test]
    fn lookups_resolve_known_and_unknown_ids() {
        let registry = TurbineRegistry::new();

        assert_eq!(registry.display_name(152), "TPK01");
        assert_eq!(registry.display_name(999), "Turbine 999");
        assert_eq!(registry.location_of(268), "Tera Cora");
        assert_eq!(registry.location_of(999), "");
        assert_eq!(registry.location_ids("Koraal Tabak").unwrap().len(), 5);
        assert!(registry.location_ids("Atlantis").is_none());
        assert!(registry.coordinates(460).is_some());
        assert!(registry.coordinates(999).is_none());
        assert_eq!(registry.device_ids().len(), 20);
    }
}
