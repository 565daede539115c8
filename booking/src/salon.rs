use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ledger::ServiceTimes;
use crate::location::{Coordinates, ResolvedLocation};
use crate::model::{SalonId, ServiceItem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Salon {
    pub id: SalonId,
    pub name: String,
    pub address: String,
    pub location: Coordinates,
    #[serde(default)]
    pub services: Vec<ServiceItem>,
    /// Historical minutes per customer; falls back to the configured default.
    #[serde(default)]
    pub average_service_minutes: Option<u32>,
}

impl Salon {
    /// Looks up offered services by name, preserving the requested order.
    pub fn pick_services(&self, names: &[String]) -> Result<Vec<ServiceItem>, String> {
        names
            .iter()
            .map(|name| {
                self.services
                    .iter()
                    .find(|s| s.name.eq_ignore_ascii_case(name))
                    .cloned()
                    .ok_or_else(|| format!("{} does not offer '{}'", self.name, name))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalonMatch {
    pub salon: Salon,
    pub distance_km: f64,
}

/// On-disk catalog: salons plus a gazetteer of searchable places.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub salons: Vec<Salon>,
    #[serde(default)]
    pub places: Vec<ResolvedLocation>,
}

impl Catalog {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("invalid salon catalog")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read salon catalog {}", path.display()))?;
        let catalog = Self::from_json(&raw)?;
        info!(
            salons = catalog.salons.len(),
            places = catalog.places.len(),
            path = %path.display(),
            "salon catalog loaded"
        );
        Ok(catalog)
    }
}

/// In-memory index of salons for lookup and proximity search.
#[derive(Debug, Clone, Default)]
pub struct SalonDirectory {
    salons: Vec<Salon>,
    by_id: HashMap<SalonId, usize>,
}

impl SalonDirectory {
    pub fn new(salons: Vec<Salon>) -> Self {
        let by_id = salons
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        Self { salons, by_id }
    }

    pub fn get(&self, salon_id: &str) -> Option<&Salon> {
        self.by_id.get(salon_id).map(|&i| &self.salons[i])
    }

    /// Salons within `radius_km` of `origin`, nearest first. Ties keep
    /// catalog order.
    pub fn search_nearby(&self, origin: &Coordinates, radius_km: f64) -> Vec<SalonMatch> {
        let mut hits: Vec<SalonMatch> = self
            .salons
            .iter()
            .map(|s| SalonMatch {
                distance_km: origin.distance_km(&s.location),
                salon: s.clone(),
            })
            .filter(|m| m.distance_km <= radius_km)
            .collect();

        hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

        debug!(radius_km, found = hits.len(), "nearby salon search");
        hits
    }

    /// Wait-time table seeded with each salon's historical average.
    pub fn service_times(&self, default_minutes: u32) -> ServiceTimes {
        self.salons
            .iter()
            .filter_map(|s| s.average_service_minutes.map(|m| (s.id.clone(), m)))
            .fold(ServiceTimes::new(default_minutes), |t, (id, m)| t.with_salon(id, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "salons": [
            {
                "id": "s-far",
                "name": "Far Cuts",
                "address": "Whitefield",
                "location": {"lat": 12.9698, "lng": 77.7500},
                "services": [{"name": "Haircut", "price": 250, "duration": 25}]
            },
            {
                "id": "s-near",
                "name": "Near Fades",
                "address": "Koramangala",
                "location": {"lat": 12.9360, "lng": 77.6250},
                "services": [
                    {"name": "Haircut", "price": 300, "duration": 30},
                    {"name": "BeardTrim", "price": 150, "duration": 20}
                ],
                "averageServiceMinutes": 25
            }
        ],
        "places": [
            {"lat": 12.9352, "lng": 77.6245, "formattedAddress": "Koramangala, Bengaluru"}
        ]
    }"#;

    fn directory() -> SalonDirectory {
        SalonDirectory::new(Catalog::from_json(CATALOG).unwrap().salons)
    }

    #[test]
    fn nearby_search_sorts_by_distance_and_respects_radius() {
        let dir = directory();
        let origin = Coordinates::new(12.9352, 77.6245);

        let all = dir.search_nearby(&origin, 50.0);
        let ids: Vec<_> = all.iter().map(|m| m.salon.id.as_str()).collect();
        assert_eq!(ids, vec!["s-near", "s-far"]);
        assert!(all[0].distance_km < 1.0);

        let close = dir.search_nearby(&origin, 2.0);
        assert_eq!(close.len(), 1);
    }

    #[test]
    fn pick_services_matches_case_insensitively_in_order() {
        let dir = directory();
        let salon = dir.get("s-near").unwrap();

        let picked = salon
            .pick_services(&["beardtrim".into(), "HAIRCUT".into()])
            .unwrap();
        assert_eq!(picked[0].name, "BeardTrim");
        assert_eq!(picked[1].price, 300);

        assert!(salon.pick_services(&["Facial".into()]).is_err());
    }

    #[test]
    fn service_times_use_salon_averages() {
        let times = directory().service_times(15);
        assert_eq!(times.average_for("s-near"), 25);
        assert_eq!(times.average_for("s-far"), 15);
    }

    #[test]
    fn catalog_parses_places() {
        let catalog = Catalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.places[0].formatted_address, "Koramangala, Bengaluru");
        assert!(Catalog::from_json("[").is_err());
    }
}
