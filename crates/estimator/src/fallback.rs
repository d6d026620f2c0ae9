use carbon_core::Item;

/// Base footprint assumed when the item carries no `estimatedCarbon`.
pub const DEFAULT_ESTIMATED_CARBON_KG: f64 = 1.0;
/// Flat transport surcharge per kilometre travelled.
pub const TRANSPORT_KG_CO2_PER_KM: f64 = 0.1;

pub fn fallback_footprint(item: &Item, distance_km: Option<f64>) -> f64 {
    let base = item.estimated_carbon.unwrap_or(DEFAULT_ESTIMATED_CARBON_KG);
    let transport = distance_km.unwrap_or(0.0) * TRANSPORT_KG_CO2_PER_KM;
    base + transport
}
